//! Restore Orchestrator
//!
//! A restore is accepted only when the backup is annotated as belonging to the
//! application, its sequence was installed in the backup's cluster, and no
//! other restore is in flight for the application. Acceptance records the
//! generated restore name on the application; progress is then read back from
//! the controller's `Restore` and `PodVolumeRestore` resources by that name.

use std::sync::Arc;

use chrono::Utc;
use lifeboat_core::constants::{
    APP_ID_ANNOTATION, APP_SEQUENCE_ANNOTATION, CLUSTER_ID_ANNOTATION, RESTORE_NAME_LABEL,
};
use lifeboat_core::models::RestoreDetail;
use lifeboat_core::naming::restore_name;
use lifeboat_core::{SnapshotError, SnapshotResult};
use lifeboat_kube::resources::{decode, encode, paths, Backup, ObjectMeta, Restore};
use lifeboat_kube::{Method, ResourceApi};

use crate::collaborators::AppStore;
use crate::download::DownloadProtocol;
use crate::summarizer::pod_volumes;

pub struct RestoreOrchestrator {
    velero: Arc<dyn ResourceApi>,
    apps: Arc<dyn AppStore>,
    downloads: Arc<DownloadProtocol>,
}

impl RestoreOrchestrator {
    pub fn new(
        velero: Arc<dyn ResourceApi>,
        apps: Arc<dyn AppStore>,
        downloads: Arc<DownloadProtocol>,
    ) -> Self {
        Self {
            velero,
            apps,
            downloads,
        }
    }

    /// Validate and accept a restore of `backup_name` into `app_id`.
    pub async fn start_restore(
        &self,
        app_id: &str,
        backup_name: &str,
    ) -> SnapshotResult<RestoreDetail> {
        let backup: Backup = decode(
            self.velero
                .request(Method::GET, &paths::named(paths::BACKUPS, backup_name), None)
                .await?,
        )?;
        let annotations = backup.annotations();

        let missing = |key: &str| {
            SnapshotError::PreconditionFailed(format!(
                "backup {} is missing the {} annotation",
                backup_name, key
            ))
        };
        let backup_app_id = annotations
            .app_id
            .ok_or_else(|| missing(APP_ID_ANNOTATION))?;
        let cluster_id = annotations
            .cluster_id
            .ok_or_else(|| missing(CLUSTER_ID_ANNOTATION))?;
        let sequence = annotations
            .sequence
            .ok_or_else(|| missing(APP_SEQUENCE_ANNOTATION))?;

        if backup_app_id != app_id {
            return Err(SnapshotError::PreconditionFailed(format!(
                "backup {} belongs to application {}, not {}",
                backup_name, backup_app_id, app_id
            )));
        }

        let app = self.apps.get_app(app_id).await?;

        let installed = app.current_sequence == Some(sequence)
            || self
                .apps
                .list_past_versions(app_id, &cluster_id)
                .await?
                .iter()
                .any(|version| version.sequence == sequence);
        if !installed {
            return Err(SnapshotError::PreconditionFailed(format!(
                "sequence {} of application {} was never installed in cluster {}",
                sequence, app.slug, cluster_id
            )));
        }

        if let Some(in_progress) = app.restore_in_progress_name.as_deref() {
            return Err(SnapshotError::PreconditionFailed(format!(
                "restore {} is already in progress for application {}",
                in_progress, app.slug
            )));
        }

        let name = restore_name(backup_name, Utc::now().timestamp());
        self.apps
            .update_restore_in_progress_marker(app_id, Some(&name))
            .await?;

        tracing::info!(
            app_id = %app_id,
            backup = %backup_name,
            restore = %name,
            sequence = sequence,
            "Restore accepted"
        );

        Ok(RestoreDetail::pending(name))
    }

    /// Detail of the restore recorded on the application, if any.
    pub async fn restore_detail(&self, app_id: &str) -> SnapshotResult<Option<RestoreDetail>> {
        let app = self.apps.get_app(app_id).await?;
        match app.restore_in_progress_name {
            Some(name) => Ok(Some(self.restore_status(&name).await?)),
            None => Ok(None),
        }
    }

    pub async fn restore_status(&self, name: &str) -> SnapshotResult<RestoreDetail> {
        let restore: Restore = match self
            .velero
            .request(Method::GET, &paths::named(paths::RESTORES, name), None)
            .await
        {
            Ok(value) => decode(value)?,
            Err(e) if e.is_not_found() => return Ok(RestoreDetail::pending(name)),
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let volumes = pod_volumes(
            self.velero.as_ref(),
            paths::POD_VOLUME_RESTORES,
            RESTORE_NAME_LABEL,
            name,
        )
        .await?
        .iter()
        .map(|volume| volume.progress(now))
        .collect();

        let phase = restore.phase();
        let mut detail = RestoreDetail {
            name: name.to_string(),
            phase,
            volumes,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        if phase.is_terminal() {
            let results = self.downloads.get_restore_results(name).await?;
            detail.errors = results.errors.namespace_issues("Restore error");
            detail.warnings = results.warnings.namespace_issues("Restore warning");
        }

        Ok(detail)
    }

    /// Create the controller `Restore` for an accepted restore. An existing
    /// restore with the same name is left as is.
    pub async fn execute_restore(
        &self,
        backup_name: &str,
        restore_name: &str,
    ) -> SnapshotResult<()> {
        let restore = Restore::new(
            ObjectMeta::named(restore_name, self.velero.namespace()),
            backup_name,
        );

        match self
            .velero
            .request(Method::POST, paths::RESTORES, Some(&encode(&restore)?))
            .await
        {
            Ok(_) => {
                tracing::info!(backup = %backup_name, restore = %restore_name, "Restore created");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(restore = %restore_name, "Restore already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Clear the restore-in-progress marker of `app_id`.
    pub async fn cancel_restore(&self, app_id: &str) -> SnapshotResult<()> {
        self.apps
            .update_restore_in_progress_marker(app_id, None)
            .await?;
        tracing::info!(app_id = %app_id, "Restore marker cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogfmtBackupLogParser;
    use crate::testing::{annotated_backup, app, gzip, pod_volume, MockAppStore};
    use lifeboat_core::models::JobPhase;
    use lifeboat_core::DownloadPolicy;
    use lifeboat_kube::testing::MockCluster;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        cluster: MockCluster,
        apps: MockAppStore,
        orchestrator: RestoreOrchestrator,
    }

    fn fixture() -> Fixture {
        let cluster = MockCluster::new("velero");
        let apps = MockAppStore::new();
        apps.add_app(app("a1", "app1"));

        let api: Arc<dyn ResourceApi> = Arc::new(cluster.clone());
        let downloads = DownloadProtocol::new(
            api.clone(),
            reqwest::Client::new(),
            DownloadPolicy {
                max_attempts: 3,
                poll_interval: Duration::from_millis(1),
            },
            Arc::new(LogfmtBackupLogParser),
        );
        let orchestrator =
            RestoreOrchestrator::new(api, Arc::new(apps.clone()), Arc::new(downloads));

        Fixture {
            cluster,
            apps,
            orchestrator,
        }
    }

    fn precondition_message(err: SnapshotError) -> String {
        match err {
            SnapshotError::PreconditionFailed(message) => message,
            other => panic!("expected PreconditionFailed, got {:?}", other),
        }
    }

    async fn start_without(annotation: &str) -> String {
        let f = fixture();
        let mut backup = annotated_backup("b1", &f.apps.app("a1"), 2, "Completed");
        backup["metadata"]["annotations"]
            .as_object_mut()
            .unwrap()
            .remove(annotation);
        f.cluster.insert(paths::BACKUPS, backup);

        precondition_message(f.orchestrator.start_restore("a1", "b1").await.unwrap_err())
    }

    #[tokio::test]
    async fn test_missing_annotations_have_distinct_messages() {
        let missing_app = start_without(APP_ID_ANNOTATION).await;
        let missing_cluster = start_without(CLUSTER_ID_ANNOTATION).await;
        let missing_sequence = start_without(APP_SEQUENCE_ANNOTATION).await;

        assert!(missing_app.contains(APP_ID_ANNOTATION));
        assert!(missing_cluster.contains(CLUSTER_ID_ANNOTATION));
        assert!(missing_sequence.contains(APP_SEQUENCE_ANNOTATION));
        assert_ne!(missing_app, missing_sequence);
        assert_ne!(missing_app, missing_cluster);
    }

    #[tokio::test]
    async fn test_backup_of_another_app_is_rejected() {
        let f = fixture();
        f.cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &app("a2", "app2"), 2, "Completed"),
        );

        let message =
            precondition_message(f.orchestrator.start_restore("a1", "b1").await.unwrap_err());
        assert!(message.contains("a2"));
    }

    #[tokio::test]
    async fn test_never_installed_sequence_is_rejected() {
        let f = fixture();
        f.cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &f.apps.app("a1"), 1, "Completed"),
        );

        let message =
            precondition_message(f.orchestrator.start_restore("a1", "b1").await.unwrap_err());
        assert!(message.contains("never installed"));
        assert!(f.apps.app("a1").restore_in_progress_name.is_none());

        f.apps.add_past_version("a1", "cluster-1", 1);
        let detail = f.orchestrator.start_restore("a1", "b1").await.unwrap();
        assert!(detail.name.starts_with("b1-"));
    }

    #[tokio::test]
    async fn test_restore_in_progress_is_named() {
        let f = fixture();
        let mut busy = f.apps.app("a1");
        busy.restore_in_progress_name = Some("b0-1700000000".to_string());
        f.apps.add_app(busy);
        f.cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &f.apps.app("a1"), 2, "Completed"),
        );

        let message =
            precondition_message(f.orchestrator.start_restore("a1", "b1").await.unwrap_err());
        assert!(message.contains("b0-1700000000"));
    }

    #[tokio::test]
    async fn test_start_restore_sets_marker() {
        let f = fixture();
        f.cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &f.apps.app("a1"), 2, "PartiallyFailed"),
        );

        let detail = f.orchestrator.start_restore("a1", "b1").await.unwrap();

        assert_eq!(detail.phase, JobPhase::New);
        assert!(detail.volumes.is_empty());
        assert_eq!(
            f.apps.app("a1").restore_in_progress_name.as_deref(),
            Some(detail.name.as_str())
        );
        // Accepting a restore does not create the controller resource.
        assert_eq!(f.cluster.count_calls(Method::POST, paths::RESTORES), 0);
    }

    #[tokio::test]
    async fn test_unknown_backup_propagates_not_found() {
        let f = fixture();
        let err = f.orchestrator.start_restore("a1", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_restore_not_yet_created_is_pending() {
        let f = fixture();
        let detail = f.orchestrator.restore_status("b1-1700000000").await.unwrap();
        assert_eq!(detail, RestoreDetail::pending("b1-1700000000"));
    }

    #[tokio::test]
    async fn test_restore_in_progress_reports_volumes() {
        let f = fixture();
        f.cluster.insert(
            paths::RESTORES,
            json!({
                "metadata": {"name": "r1"},
                "spec": {"backupName": "b1"},
                "status": {"phase": "InProgress"}
            }),
        );
        f.cluster.insert(
            paths::POD_VOLUME_RESTORES,
            pod_volume("r1-data", RESTORE_NAME_LABEL, "r1", "InProgress", 500, 2000),
        );

        let detail = f.orchestrator.restore_status("r1").await.unwrap();

        assert_eq!(detail.phase, JobPhase::InProgress);
        assert_eq!(detail.volumes.len(), 1);
        assert_eq!(detail.volumes[0].completion_percent, Some(25));
        assert_eq!(detail.volumes[0].pod_name.as_deref(), Some("r1-data-pod"));
        assert!(detail.errors.is_empty());
        assert_eq!(f.cluster.count_calls(Method::POST, paths::DOWNLOAD_REQUESTS), 0);
    }

    #[tokio::test]
    async fn test_terminal_restore_surfaces_namespace_issues() {
        let mut server = mockito::Server::new_async().await;
        let results = r#"{
            "errors": {"namespaces": {"app1": ["error restoring pods/web"]}},
            "warnings": {"velero": ["ignored"], "namespaces": {"app1": ["already exists"]}}
        }"#;
        let _mock = server
            .mock("GET", "/r1-results.gz")
            .with_status(200)
            .with_body(gzip(results.as_bytes()))
            .create_async()
            .await;

        let f = fixture();
        f.cluster
            .serve_download_url_after(1, &format!("{}/r1-results.gz", server.url()));
        f.cluster.insert(
            paths::RESTORES,
            json!({"metadata": {"name": "r1"}, "status": {"phase": "PartiallyFailed"}}),
        );

        let detail = f.orchestrator.restore_status("r1").await.unwrap();

        assert_eq!(detail.phase, JobPhase::PartiallyFailed);
        assert_eq!(detail.errors.len(), 1);
        assert_eq!(detail.errors[0].title, "Restore error");
        assert_eq!(detail.errors[0].namespace.as_deref(), Some("app1"));
        assert_eq!(detail.warnings.len(), 1);
        assert_eq!(detail.warnings[0].message, "already exists");
    }

    #[tokio::test]
    async fn test_restore_detail_follows_marker() {
        let f = fixture();
        assert!(f.orchestrator.restore_detail("a1").await.unwrap().is_none());

        f.cluster.insert(
            paths::BACKUPS,
            annotated_backup("b1", &f.apps.app("a1"), 2, "Completed"),
        );
        let started = f.orchestrator.start_restore("a1", "b1").await.unwrap();

        let detail = f.orchestrator.restore_detail("a1").await.unwrap().unwrap();
        assert_eq!(detail.name, started.name);
        assert_eq!(detail.phase, JobPhase::New);

        f.orchestrator.cancel_restore("a1").await.unwrap();
        assert!(f.orchestrator.restore_detail("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_execute_restore_creates_resource_once() {
        let f = fixture();

        f.orchestrator.execute_restore("b1", "r1").await.unwrap();
        f.orchestrator.execute_restore("b1", "r1").await.unwrap();

        let restores = f.cluster.objects(paths::RESTORES);
        assert_eq!(restores.len(), 1);
        assert_eq!(restores[0]["spec"]["backupName"], "b1");
        assert_eq!(restores[0]["metadata"]["namespace"], "velero");
        assert_eq!(f.cluster.count_calls(Method::POST, paths::RESTORES), 2);
    }
}
