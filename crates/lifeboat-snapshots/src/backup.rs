//! Backup creation and deletion.

use std::sync::Arc;

use chrono::Utc;
use lifeboat_core::constants::{APP_SLUG_KEY, BACKUP_NAME_LABEL};
use lifeboat_core::models::SnapshotTrigger;
use lifeboat_core::naming::backup_name;
use lifeboat_core::{get_valid_name, SnapshotError, SnapshotResult};
use lifeboat_kube::resources::{
    decode, encode, paths, Backup, BackupAnnotations, BackupSpec, DeleteBackupRequest, ObjectMeta,
};
use lifeboat_kube::{Method, ResourceApi};
use serde_json::Map;

use crate::collaborators::AppStore;
use crate::locations::StorageLocationManager;

pub struct BackupService {
    velero: Arc<dyn ResourceApi>,
    apps: Arc<dyn AppStore>,
    locations: Arc<StorageLocationManager>,
    default_ttl: String,
}

impl BackupService {
    pub fn new(
        velero: Arc<dyn ResourceApi>,
        apps: Arc<dyn AppStore>,
        locations: Arc<StorageLocationManager>,
        default_ttl: impl Into<String>,
    ) -> Self {
        Self {
            velero,
            apps,
            locations,
            default_ttl: default_ttl.into(),
        }
    }

    /// Back up the namespace of `app_id` into its own storage location.
    pub async fn create_backup(
        &self,
        app_id: &str,
        cluster_id: &str,
        trigger: SnapshotTrigger,
    ) -> SnapshotResult<Backup> {
        let app = self.apps.get_app(app_id).await?;
        let sequence = app.current_sequence.ok_or_else(|| {
            SnapshotError::PreconditionFailed(format!(
                "application {} has no deployed version to back up",
                app.slug
            ))
        })?;
        self.locations.ensure_app_location(&app.slug).await?;

        let name = backup_name(&app.slug, Utc::now().timestamp());
        let mut metadata = ObjectMeta::named(&name, self.velero.namespace());
        metadata
            .labels
            .insert(APP_SLUG_KEY.to_string(), app.slug.clone());

        let mut backup = Backup::new(
            metadata,
            BackupSpec {
                included_namespaces: vec![app.namespace.clone()],
                storage_location: Some(app.slug.clone()),
                ttl: Some(
                    app.snapshot_ttl
                        .clone()
                        .unwrap_or_else(|| self.default_ttl.clone()),
                ),
                extra: Map::new(),
            },
        );
        backup.set_annotations(&BackupAnnotations {
            app_id: Some(app.id.clone()),
            app_slug: Some(app.slug.clone()),
            cluster_id: Some(cluster_id.to_string()),
            sequence: Some(sequence),
            trigger: Some(trigger),
            volume_summary: None,
        });

        let created = self
            .velero
            .request(Method::POST, paths::BACKUPS, Some(&encode(&backup)?))
            .await?;

        tracing::info!(
            app_id = %app_id,
            backup = %name,
            trigger = %trigger,
            sequence = sequence,
            "Backup created"
        );
        decode(created)
    }

    /// Ask the controller to delete `name` together with its stored data.
    pub async fn delete_backup(&self, name: &str) -> SnapshotResult<()> {
        let request_name = get_valid_name(&format!("{}-{}", name, Utc::now().timestamp()));
        let mut metadata = ObjectMeta::named(request_name, self.velero.namespace());
        metadata
            .labels
            .insert(BACKUP_NAME_LABEL.to_string(), get_valid_name(name));

        let request = DeleteBackupRequest::new(metadata, name);
        self.velero
            .request(
                Method::POST,
                paths::DELETE_BACKUP_REQUESTS,
                Some(&encode(&request)?),
            )
            .await?;

        tracing::info!(backup = %name, "Backup deletion requested");
        Ok(())
    }
}
