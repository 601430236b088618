//! In-memory [`AppStore`] and [`ScheduleStore`] implementations plus backup
//! fixtures, so services can be exercised against a `MockCluster` without a
//! console database. Shared by unit tests and, through the `testing` feature,
//! by integration tests.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use lifeboat_core::models::{App, AppVersion};
use lifeboat_core::{SnapshotError, SnapshotResult};
use serde_json::{json, Value};

use crate::collaborators::{AppStore, ScheduleStore};

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn app(id: &str, slug: &str) -> App {
    App {
        id: id.to_string(),
        slug: slug.to_string(),
        name: slug.to_string(),
        namespace: slug.to_string(),
        current_sequence: Some(2),
        restore_in_progress_name: None,
        snapshot_ttl: None,
    }
}

/// Backup resource JSON with the full annotation contract for `app`.
pub fn annotated_backup(name: &str, app: &App, sequence: i64, phase: &str) -> Value {
    json!({
        "apiVersion": "velero.io/v1",
        "kind": "Backup",
        "metadata": {
            "name": name,
            "namespace": "velero",
            "labels": {"lifeboat.io/app-slug": app.slug},
            "annotations": {
                "lifeboat.io/app-id": app.id,
                "lifeboat.io/app-slug": app.slug,
                "lifeboat.io/cluster-id": "cluster-1",
                "lifeboat.io/app-sequence": sequence.to_string(),
                "lifeboat.io/snapshot-trigger": "manual"
            }
        },
        "spec": {"includedNamespaces": [app.namespace], "storageLocation": app.slug},
        "status": {"phase": phase}
    })
}

/// Volume operation JSON labelled with `label_key=owner`.
pub fn pod_volume(
    name: &str,
    label_key: &str,
    owner: &str,
    phase: &str,
    done: u64,
    total: u64,
) -> Value {
    json!({
        "metadata": {"name": name, "labels": {label_key: owner}},
        "spec": {"pod": {"name": format!("{}-pod", name), "namespace": "app"}, "volume": "data"},
        "status": {
            "phase": phase,
            "startTimestamp": "2024-01-02T03:04:05Z",
            "progress": {"totalBytes": total, "bytesDone": done}
        }
    })
}

/// Mock app store for testing without a database
#[derive(Clone, Default)]
pub struct MockAppStore {
    apps: Arc<Mutex<HashMap<String, App>>>,
    past_versions: Arc<Mutex<HashMap<(String, String), Vec<AppVersion>>>>,
}

impl MockAppStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_app(&self, app: App) {
        self.apps.lock().unwrap().insert(app.id.clone(), app);
    }

    pub fn add_past_version(&self, app_id: &str, cluster_id: &str, sequence: i64) {
        self.past_versions
            .lock()
            .unwrap()
            .entry((app_id.to_string(), cluster_id.to_string()))
            .or_default()
            .push(AppVersion {
                sequence,
                version_label: None,
            });
    }

    pub fn app(&self, app_id: &str) -> App {
        self.apps.lock().unwrap()[app_id].clone()
    }
}

#[async_trait]
impl AppStore for MockAppStore {
    async fn get_app(&self, app_id: &str) -> SnapshotResult<App> {
        self.apps
            .lock()
            .unwrap()
            .get(app_id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound(format!("app {}", app_id)))
    }

    async fn list_past_versions(
        &self,
        app_id: &str,
        cluster_id: &str,
    ) -> SnapshotResult<Vec<AppVersion>> {
        Ok(self
            .past_versions
            .lock()
            .unwrap()
            .get(&(app_id.to_string(), cluster_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_restore_in_progress_marker(
        &self,
        app_id: &str,
        restore_name: Option<&str>,
    ) -> SnapshotResult<()> {
        let mut apps = self.apps.lock().unwrap();
        let app = apps
            .get_mut(app_id)
            .ok_or_else(|| SnapshotError::NotFound(format!("app {}", app_id)))?;
        app.restore_in_progress_name = restore_name.map(str::to_string);
        Ok(())
    }

    async fn update_snapshot_ttl(&self, app_id: &str, ttl: &str) -> SnapshotResult<()> {
        let mut apps = self.apps.lock().unwrap();
        let app = apps
            .get_mut(app_id)
            .ok_or_else(|| SnapshotError::NotFound(format!("app {}", app_id)))?;
        app.snapshot_ttl = Some(ttl.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockScheduleStore {
    schedules: Arc<Mutex<HashMap<String, String>>>,
}

impl MockScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, app_id: &str) -> Option<String> {
        self.schedules.lock().unwrap().get(app_id).cloned()
    }
}

#[async_trait]
impl ScheduleStore for MockScheduleStore {
    async fn read_schedule(&self, app_id: &str) -> SnapshotResult<Option<String>> {
        Ok(self.schedule(app_id))
    }

    async fn write_schedule(&self, app_id: &str, schedule: &str) -> SnapshotResult<()> {
        self.schedules
            .lock()
            .unwrap()
            .insert(app_id.to_string(), schedule.to_string());
        Ok(())
    }

    async fn delete_schedule(&self, app_id: &str) -> SnapshotResult<()> {
        self.schedules.lock().unwrap().remove(app_id);
        Ok(())
    }
}
