use chrono::{DateTime, Utc};
use lifeboat_core::models::{TransferProgress, VolumeProgress};
use serde::{Deserialize, Serialize};

use super::metadata::ObjectMeta;

/// Per-volume sub-job of a backup (`PodVolumeBackup`) or restore
/// (`PodVolumeRestore`). Both kinds share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodVolumeOperation {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodVolumeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PodVolumeStatus>,
}

pub type PodVolumeBackup = PodVolumeOperation;
pub type PodVolumeRestore = PodVolumeOperation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodVolumeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodReference>,
    #[serde(default)]
    pub volume: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodVolumeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<VolumeByteProgress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeByteProgress {
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub bytes_done: u64,
}

impl PodVolumeOperation {
    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default()
    }

    pub fn bytes_done(&self) -> u64 {
        self.byte_progress().bytes_done
    }

    pub fn byte_progress(&self) -> VolumeByteProgress {
        self.status
            .as_ref()
            .and_then(|s| s.progress)
            .unwrap_or_default()
    }

    /// Operator-facing progress of this volume as of `now`.
    pub fn progress(&self, now: DateTime<Utc>) -> VolumeProgress {
        let status = self.status.clone().unwrap_or_default();
        let bytes = self.byte_progress();
        let pod = self.spec.pod.clone().unwrap_or_default();

        VolumeProgress::new(
            self.metadata.name.clone(),
            Some(pod.name).filter(|n| !n.is_empty()),
            pod.namespace,
            self.phase().to_string(),
            status.completion_timestamp,
            TransferProgress {
                total_bytes: bytes.total_bytes,
                bytes_done: bytes.bytes_done,
                started: status.start_timestamp,
            },
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_from_controller_status() {
        let started = Utc::now() - chrono::Duration::seconds(20);
        let volume: PodVolumeRestore = serde_json::from_value(json!({
            "metadata": {"name": "restore-1-abcde"},
            "spec": {"pod": {"name": "db-0", "namespace": "app"}, "volume": "data"},
            "status": {
                "phase": "InProgress",
                "startTimestamp": started,
                "progress": {"totalBytes": 4000, "bytesDone": 1000}
            }
        }))
        .unwrap();

        let progress = volume.progress(started + chrono::Duration::seconds(20));
        assert_eq!(progress.pod_name.as_deref(), Some("db-0"));
        assert_eq!(progress.pod_namespace.as_deref(), Some("app"));
        assert_eq!(progress.phase, "InProgress");
        assert_eq!(progress.completion_percent, Some(25));
        // 50 bytes/s, 3000 bytes left.
        assert_eq!(progress.time_remaining_seconds, Some(60));
        assert_eq!(progress.size_bytes_human, "4 kB");
        assert_eq!(progress.done_bytes_human, "1 kB");
    }

    #[test]
    fn test_volume_without_status() {
        let volume: PodVolumeBackup =
            serde_json::from_value(json!({"metadata": {"name": "b1-x"}})).unwrap();
        assert_eq!(volume.phase(), "");
        assert_eq!(volume.bytes_done(), 0);
    }
}
