//! Backup Summarizer
//!
//! Turns backup resources into operator-facing [`Snapshot`]s. The per-volume
//! aggregate is expensive (one list call per backup), so once a backup reaches
//! a terminal phase its summary is written back onto the backup's annotations
//! and read from there afterwards.

use std::sync::Arc;

use chrono::Utc;
use lifeboat_core::constants::{APP_SLUG_KEY, BACKUP_NAME_LABEL};
use lifeboat_core::models::{Snapshot, SnapshotDetail, VolumeSummary};
use lifeboat_core::{get_valid_name, human_bytes, SnapshotResult};
use lifeboat_kube::resources::{
    decode, encode, paths, Backup, BackupAnnotations, List, PodVolumeOperation,
};
use lifeboat_kube::{Method, ResourceApi};

use crate::download::DownloadProtocol;

const COMPLETED: &str = "Completed";

pub struct BackupSummarizer {
    velero: Arc<dyn ResourceApi>,
    downloads: Arc<DownloadProtocol>,
}

impl BackupSummarizer {
    pub fn new(velero: Arc<dyn ResourceApi>, downloads: Arc<DownloadProtocol>) -> Self {
        Self { velero, downloads }
    }

    pub async fn summarize(&self, backup: &Backup) -> SnapshotResult<Snapshot> {
        let annotations = backup.annotations();
        if let Some(summary) = annotations.volume_summary {
            return Ok(snapshot(backup, &annotations, summary));
        }

        let volumes = pod_volumes(
            self.velero.as_ref(),
            paths::POD_VOLUME_BACKUPS,
            BACKUP_NAME_LABEL,
            backup.name(),
        )
        .await?;
        let summary = fold_volumes(&volumes);

        if backup.phase().is_terminal() {
            self.cache_summary(backup, summary).await?;
        }

        Ok(snapshot(backup, &annotations, summary))
    }

    async fn cache_summary(&self, backup: &Backup, summary: VolumeSummary) -> SnapshotResult<()> {
        let mut updated = backup.clone();
        updated.set_volume_summary(summary);

        let path = paths::named(paths::BACKUPS, backup.name());
        match self
            .velero
            .request(Method::PUT, &path, Some(&encode(&updated)?))
            .await
        {
            Ok(_) => {
                tracing::debug!(backup = %backup.name(), "Cached volume summary");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    backup = %backup.name(),
                    error = %e,
                    "Backup changed while caching volume summary; skipping"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshots of the application `slug`, newest first.
    pub async fn list_snapshots(&self, slug: &str) -> SnapshotResult<Vec<Snapshot>> {
        let list: List<Backup> = decode(
            self.velero
                .request(
                    Method::GET,
                    &paths::with_label(paths::BACKUPS, APP_SLUG_KEY, slug),
                    None,
                )
                .await?,
        )?;

        let mut backups = list.items;
        backups.sort_by_key(|backup| {
            std::cmp::Reverse(
                backup
                    .status
                    .as_ref()
                    .and_then(|s| s.start_timestamp)
                    .or(backup.metadata.creation_timestamp),
            )
        });

        let mut snapshots = Vec::with_capacity(backups.len());
        for backup in &backups {
            snapshots.push(self.summarize(backup).await?);
        }
        Ok(snapshots)
    }

    pub async fn snapshot_detail(&self, name: &str) -> SnapshotResult<SnapshotDetail> {
        let backup: Backup = decode(
            self.velero
                .request(Method::GET, &paths::named(paths::BACKUPS, name), None)
                .await?,
        )?;
        let snapshot = self.summarize(&backup).await?;

        let now = Utc::now();
        let volumes = pod_volumes(
            self.velero.as_ref(),
            paths::POD_VOLUME_BACKUPS,
            BACKUP_NAME_LABEL,
            name,
        )
        .await?
        .iter()
        .map(|volume| volume.progress(now))
        .collect();

        let logs = if backup.phase().is_terminal() {
            match self.downloads.get_backup_logs(name).await {
                Ok(logs) => Some(logs),
                Err(e) => {
                    tracing::warn!(backup = %name, error = %e, "Failed to get backup logs");
                    None
                }
            }
        } else {
            None
        };

        Ok(SnapshotDetail {
            snapshot,
            namespaces: backup.spec.included_namespaces.clone(),
            volumes,
            logs,
        })
    }
}

/// Per-volume sub-resources in `collection` labelled with `owner`.
pub(crate) async fn pod_volumes(
    api: &dyn ResourceApi,
    collection: &str,
    label: &str,
    owner: &str,
) -> SnapshotResult<Vec<PodVolumeOperation>> {
    let path = paths::with_label(collection, label, &get_valid_name(owner));
    let list: List<PodVolumeOperation> = decode(api.request(Method::GET, &path, None).await?)?;
    Ok(list.items)
}

fn fold_volumes(volumes: &[PodVolumeOperation]) -> VolumeSummary {
    volumes
        .iter()
        .fold(VolumeSummary::default(), |mut summary, volume| {
            summary.count += 1;
            if volume.phase() == COMPLETED {
                summary.success_count += 1;
            }
            summary.total_bytes += volume.bytes_done();
            summary
        })
}

fn snapshot(backup: &Backup, annotations: &BackupAnnotations, summary: VolumeSummary) -> Snapshot {
    let status = backup.status.clone().unwrap_or_default();
    Snapshot {
        name: backup.name().to_string(),
        status: backup.phase(),
        trigger: annotations.trigger,
        app_slug: annotations
            .app_slug
            .clone()
            .or_else(|| backup.metadata.labels.get(APP_SLUG_KEY).cloned()),
        sequence: annotations.sequence,
        started: status.start_timestamp,
        finished: status.completion_timestamp,
        expires_at: status.expiration,
        volume_count: summary.count,
        volume_success_count: summary.success_count,
        volume_bytes: summary.total_bytes,
        volume_size_human: human_bytes(summary.total_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogfmtBackupLogParser;
    use crate::testing::{annotated_backup, app, gzip, pod_volume};
    use lifeboat_core::models::JobPhase;
    use lifeboat_core::{DownloadPolicy, SnapshotError};
    use lifeboat_kube::testing::MockCluster;
    use serde_json::json;
    use std::time::Duration;

    fn summarizer(cluster: &MockCluster) -> BackupSummarizer {
        let api: Arc<dyn ResourceApi> = Arc::new(cluster.clone());
        let downloads = DownloadProtocol::new(
            api.clone(),
            reqwest::Client::new(),
            DownloadPolicy {
                max_attempts: 2,
                poll_interval: Duration::from_millis(1),
            },
            Arc::new(LogfmtBackupLogParser),
        );
        BackupSummarizer::new(api, Arc::new(downloads))
    }

    fn seed_volumes(cluster: &MockCluster, backup: &str) {
        for (name, phase, done) in [
            ("v1", "Completed", 100),
            ("v2", "Completed", 200),
            ("v3", "Failed", 5),
        ] {
            cluster.insert(
                paths::POD_VOLUME_BACKUPS,
                pod_volume(name, BACKUP_NAME_LABEL, backup, phase, done, 1000),
            );
        }
        cluster.insert(
            paths::POD_VOLUME_BACKUPS,
            pod_volume("other", BACKUP_NAME_LABEL, "someone-else", "Completed", 999, 999),
        );
    }

    fn backup_from(cluster: &MockCluster, name: &str) -> Backup {
        decode(cluster.get(paths::BACKUPS, name).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_cached_summary_skips_volume_listing() {
        let cluster = MockCluster::new("velero");
        let mut value = annotated_backup("b1", &app("a1", "app1"), 2, "Completed");
        value["metadata"]["annotations"]["lifeboat.io/snapshot-volume-count"] = json!("3");
        value["metadata"]["annotations"]["lifeboat.io/snapshot-volume-success-count"] = json!("2");
        value["metadata"]["annotations"]["lifeboat.io/snapshot-volume-bytes"] = json!("1024");
        cluster.insert(paths::BACKUPS, value);

        let snapshot = summarizer(&cluster)
            .summarize(&backup_from(&cluster, "b1"))
            .await
            .unwrap();

        assert_eq!(snapshot.volume_count, 3);
        assert_eq!(snapshot.volume_success_count, 2);
        assert_eq!(snapshot.volume_bytes, 1024);
        assert_eq!(snapshot.volume_size_human, "1.02 kB");
        assert_eq!(cluster.count_calls(Method::GET, paths::POD_VOLUME_BACKUPS), 0);
        assert_eq!(cluster.count_calls(Method::PUT, paths::BACKUPS), 0);
    }

    #[tokio::test]
    async fn test_terminal_backup_summary_is_folded_and_cached() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "PartiallyFailed"),
        );
        seed_volumes(&cluster, "b1");

        let snapshot = summarizer(&cluster)
            .summarize(&backup_from(&cluster, "b1"))
            .await
            .unwrap();

        assert_eq!(snapshot.status, JobPhase::PartiallyFailed);
        assert_eq!(snapshot.volume_count, 3);
        assert_eq!(snapshot.volume_success_count, 2);
        assert_eq!(snapshot.volume_bytes, 305);
        assert_eq!(snapshot.app_slug.as_deref(), Some("app1"));
        assert_eq!(snapshot.sequence, Some(2));

        let cached = backup_from(&cluster, "b1").annotations();
        assert_eq!(
            cached.volume_summary,
            Some(VolumeSummary {
                count: 3,
                success_count: 2,
                total_bytes: 305
            })
        );
        assert_eq!(cached.app_id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_in_progress_backup_is_never_cached() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "InProgress"),
        );
        seed_volumes(&cluster, "b1");

        let snapshot = summarizer(&cluster)
            .summarize(&backup_from(&cluster, "b1"))
            .await
            .unwrap();

        assert_eq!(snapshot.volume_count, 3);
        assert_eq!(cluster.count_calls(Method::PUT, paths::BACKUPS), 0);
        assert_eq!(backup_from(&cluster, "b1").annotations().volume_summary, None);
    }

    #[tokio::test]
    async fn test_cache_conflict_is_not_an_error() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "Completed"),
        );
        seed_volumes(&cluster, "b1");
        cluster.respond_with(
            Method::PUT,
            "backups/b1",
            409,
            json!({"message": "the object has been modified"}),
        );

        let snapshot = summarizer(&cluster)
            .summarize(&backup_from(&cluster, "b1"))
            .await
            .unwrap();
        assert_eq!(snapshot.volume_bytes, 305);
    }

    #[tokio::test]
    async fn test_cache_permission_error_propagates() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "Completed"),
        );
        cluster.respond_with(Method::PUT, "backups/b1", 403, json!({}));

        let err = summarizer(&cluster)
            .summarize(&backup_from(&cluster, "b1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_list_snapshots_newest_first() {
        let cluster = MockCluster::new("velero");
        let app1 = app("a1", "app1");
        for (name, started) in [
            ("old", "2024-01-01T00:00:00Z"),
            ("new", "2024-03-01T00:00:00Z"),
            ("mid", "2024-02-01T00:00:00Z"),
        ] {
            let mut value = annotated_backup(name, &app1, 2, "InProgress");
            value["status"]["startTimestamp"] = json!(started);
            cluster.insert(paths::BACKUPS, value);
        }
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("foreign", &app("a2", "app2"), 1, "Completed"),
        );

        let snapshots = summarizer(&cluster).list_snapshots("app1").await.unwrap();
        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_snapshot_detail_with_logs() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/b1-logs.gz")
            .with_status(200)
            .with_body(gzip(
                b"time=\"2024-01-02T03:04:05Z\" level=warning msg=\"Volume skipped\" namespace=app\n",
            ))
            .create_async()
            .await;

        let cluster = MockCluster::new("velero");
        cluster.serve_download_url_after(1, &format!("{}/b1-logs.gz", server.url()));
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "Completed"),
        );
        seed_volumes(&cluster, "b1");

        let detail = summarizer(&cluster).snapshot_detail("b1").await.unwrap();

        assert_eq!(detail.namespaces, vec!["app1".to_string()]);
        assert_eq!(detail.volumes.len(), 3);
        assert_eq!(detail.volumes[0].completion_percent, Some(10));
        let logs = detail.logs.unwrap();
        assert_eq!(logs.warnings.len(), 1);
        assert_eq!(logs.warnings[0].title, "Volume skipped");
    }

    #[tokio::test]
    async fn test_snapshot_detail_survives_log_failure() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "Failed"),
        );

        let detail = summarizer(&cluster).snapshot_detail("b1").await.unwrap();

        assert_eq!(detail.snapshot.status, JobPhase::Failed);
        assert!(detail.logs.is_none());
        assert!(cluster.objects(paths::DOWNLOAD_REQUESTS).is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_detail_in_progress_has_no_logs() {
        let cluster = MockCluster::new("velero");
        cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a1", "app1"), 2, "InProgress"),
        );

        let detail = summarizer(&cluster).snapshot_detail("b1").await.unwrap();
        assert!(detail.logs.is_none());
        assert_eq!(cluster.count_calls(Method::POST, paths::DOWNLOAD_REQUESTS), 0);
    }
}
