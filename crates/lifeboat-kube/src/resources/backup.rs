use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lifeboat_core::constants::{
    APP_ID_ANNOTATION, APP_SEQUENCE_ANNOTATION, APP_SLUG_KEY, CLUSTER_ID_ANNOTATION,
    SNAPSHOT_TRIGGER_ANNOTATION, VELERO_API_VERSION, VOLUME_BYTES_ANNOTATION,
    VOLUME_COUNT_ANNOTATION, VOLUME_SUCCESS_COUNT_ANNOTATION,
};
use lifeboat_core::models::{JobPhase, SnapshotTrigger, VolumeSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metadata::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default = "velero_api_version")]
    pub api_version: String,
    #[serde(default = "backup_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BackupSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BackupStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn velero_api_version() -> String {
    VELERO_API_VERSION.to_string()
}

fn backup_kind() -> String {
    "Backup".to_string()
}

impl Backup {
    pub fn new(metadata: ObjectMeta, spec: BackupSpec) -> Self {
        Self {
            api_version: velero_api_version(),
            kind: backup_kind(),
            metadata,
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn phase(&self) -> JobPhase {
        JobPhase::from_status(self.status.as_ref().and_then(|s| s.phase.as_deref()))
    }

    pub fn annotations(&self) -> BackupAnnotations {
        BackupAnnotations::decode(&self.metadata.annotations)
    }

    /// Merge the populated fields of `annotations` into the backup's
    /// annotation map.
    pub fn set_annotations(&mut self, annotations: &BackupAnnotations) {
        annotations.apply(&mut self.metadata.annotations);
    }

    pub fn set_volume_summary(&mut self, summary: VolumeSummary) {
        self.set_annotations(&BackupAnnotations {
            volume_summary: Some(summary),
            ..Default::default()
        });
    }
}

/// Typed view of the out-of-band metadata a backup carries in annotations.
///
/// Values that are absent or fail to parse decode as `None`. The volume
/// summary is only present when all three cached counters are readable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupAnnotations {
    pub app_id: Option<String>,
    pub app_slug: Option<String>,
    pub cluster_id: Option<String>,
    pub sequence: Option<i64>,
    pub trigger: Option<SnapshotTrigger>,
    pub volume_summary: Option<VolumeSummary>,
}

impl BackupAnnotations {
    pub fn decode(annotations: &BTreeMap<String, String>) -> Self {
        let text = |key: &str| {
            annotations
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |key: &str| annotations.get(key).and_then(|v| v.trim().parse::<u64>().ok());

        let volume_summary = match (
            number(VOLUME_COUNT_ANNOTATION),
            number(VOLUME_SUCCESS_COUNT_ANNOTATION),
            number(VOLUME_BYTES_ANNOTATION),
        ) {
            (Some(count), Some(success_count), Some(total_bytes)) => Some(VolumeSummary {
                count,
                success_count,
                total_bytes,
            }),
            _ => None,
        };

        Self {
            app_id: text(APP_ID_ANNOTATION),
            app_slug: text(APP_SLUG_KEY),
            cluster_id: text(CLUSTER_ID_ANNOTATION),
            sequence: text(APP_SEQUENCE_ANNOTATION).and_then(|v| v.parse().ok()),
            trigger: text(SNAPSHOT_TRIGGER_ANNOTATION).and_then(|v| v.parse().ok()),
            volume_summary,
        }
    }

    // `None` fields leave existing entries alone.
    fn apply(&self, annotations: &mut BTreeMap<String, String>) {
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                annotations.insert(key.to_string(), value);
            }
        };

        set(APP_ID_ANNOTATION, self.app_id.clone());
        set(APP_SLUG_KEY, self.app_slug.clone());
        set(CLUSTER_ID_ANNOTATION, self.cluster_id.clone());
        set(APP_SEQUENCE_ANNOTATION, self.sequence.map(|s| s.to_string()));
        set(SNAPSHOT_TRIGGER_ANNOTATION, self.trigger.map(|t| t.to_string()));
        if let Some(summary) = self.volume_summary {
            set(VOLUME_COUNT_ANNOTATION, Some(summary.count.to_string()));
            set(
                VOLUME_SUCCESS_COUNT_ANNOTATION,
                Some(summary.success_count.to_string()),
            );
            set(VOLUME_BYTES_ANNOTATION, Some(summary.total_bytes.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decode_full_annotation_set() {
        let decoded = BackupAnnotations::decode(&annotations(&[
            (APP_ID_ANNOTATION, "app-123"),
            (APP_SLUG_KEY, "my-app"),
            (CLUSTER_ID_ANNOTATION, "cluster-1"),
            (APP_SEQUENCE_ANNOTATION, "4"),
            (SNAPSHOT_TRIGGER_ANNOTATION, "pre-upgrade"),
            (VOLUME_COUNT_ANNOTATION, "3"),
            (VOLUME_SUCCESS_COUNT_ANNOTATION, "2"),
            (VOLUME_BYTES_ANNOTATION, "1024"),
        ]));

        assert_eq!(decoded.app_id.as_deref(), Some("app-123"));
        assert_eq!(decoded.sequence, Some(4));
        assert_eq!(decoded.trigger, Some(SnapshotTrigger::PreUpgrade));
        assert_eq!(
            decoded.volume_summary,
            Some(VolumeSummary {
                count: 3,
                success_count: 2,
                total_bytes: 1024
            })
        );
    }

    #[test]
    fn test_partial_volume_cache_is_ignored() {
        let decoded = BackupAnnotations::decode(&annotations(&[
            (VOLUME_COUNT_ANNOTATION, "3"),
            (VOLUME_BYTES_ANNOTATION, "1024"),
        ]));
        assert_eq!(decoded.volume_summary, None);

        let garbled = BackupAnnotations::decode(&annotations(&[
            (VOLUME_COUNT_ANNOTATION, "3"),
            (VOLUME_SUCCESS_COUNT_ANNOTATION, "two"),
            (VOLUME_BYTES_ANNOTATION, "1024"),
        ]));
        assert_eq!(garbled.volume_summary, None);
    }

    #[test]
    fn test_set_volume_summary_keeps_other_annotations() {
        let mut backup: Backup = serde_json::from_value(json!({
            "metadata": {
                "name": "b1",
                "annotations": {"lifeboat.io/app-id": "app-123"}
            },
            "status": {"phase": "Completed"}
        }))
        .unwrap();

        backup.set_volume_summary(VolumeSummary {
            count: 1,
            success_count: 1,
            total_bytes: 10,
        });

        let decoded = backup.annotations();
        assert_eq!(decoded.app_id.as_deref(), Some("app-123"));
        assert_eq!(decoded.volume_summary.map(|s| s.total_bytes), Some(10));
        assert_eq!(backup.phase(), JobPhase::Completed);
    }

    #[test]
    fn test_set_annotations_writes_contract() {
        let mut metadata = ObjectMeta::named("app1-1700000000", "velero");
        metadata
            .annotations
            .insert("example.com/owner".to_string(), "ops".to_string());
        let mut backup = Backup::new(
            metadata,
            BackupSpec {
                included_namespaces: vec!["app1".to_string()],
                storage_location: Some("app1".to_string()),
                ttl: None,
                extra: serde_json::Map::new(),
            },
        );

        backup.set_annotations(&BackupAnnotations {
            app_id: Some("a1".to_string()),
            app_slug: Some("app1".to_string()),
            cluster_id: Some("cluster-1".to_string()),
            sequence: Some(7),
            trigger: Some(SnapshotTrigger::Schedule),
            volume_summary: None,
        });

        let encoded = serde_json::to_value(&backup).unwrap();
        let raw = &encoded["metadata"]["annotations"];
        assert_eq!(raw[APP_ID_ANNOTATION], "a1");
        assert_eq!(raw[APP_SEQUENCE_ANNOTATION], "7");
        assert_eq!(raw[SNAPSHOT_TRIGGER_ANNOTATION], "schedule");
        assert_eq!(raw["example.com/owner"], "ops");
        assert!(raw.get(VOLUME_COUNT_ANNOTATION).is_none());
        assert_eq!(backup.annotations().cluster_id.as_deref(), Some("cluster-1"));
    }

    #[test]
    fn test_backup_without_status_is_new() {
        let backup: Backup = serde_json::from_value(json!({"metadata": {"name": "b1"}})).unwrap();
        assert_eq!(backup.phase(), JobPhase::New);
        assert_eq!(backup.api_version, "velero.io/v1");
    }
}
