//! Interfaces to the console components this crate does not own: the
//! application/version store, the snapshot schedule store and the backup log
//! parser.

use async_trait::async_trait;
use lifeboat_core::models::{App, AppVersion, ParsedBackupLogs};
use lifeboat_core::SnapshotResult;

#[async_trait]
pub trait AppStore: Send + Sync {
    async fn get_app(&self, app_id: &str) -> SnapshotResult<App>;

    /// Versions previously deployed to `cluster_id`, excluding the current one.
    async fn list_past_versions(
        &self,
        app_id: &str,
        cluster_id: &str,
    ) -> SnapshotResult<Vec<AppVersion>>;

    /// Set (`Some`) or clear (`None`) the restore-in-progress marker.
    async fn update_restore_in_progress_marker(
        &self,
        app_id: &str,
        restore_name: Option<&str>,
    ) -> SnapshotResult<()>;

    /// Persist the snapshot TTL as a duration string, e.g. `720h`.
    async fn update_snapshot_ttl(&self, app_id: &str, ttl: &str) -> SnapshotResult<()>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn read_schedule(&self, app_id: &str) -> SnapshotResult<Option<String>>;

    async fn write_schedule(&self, app_id: &str, schedule: &str) -> SnapshotResult<()>;

    async fn delete_schedule(&self, app_id: &str) -> SnapshotResult<()>;
}

/// Turns decompressed backup logs into errors, warnings and hook runs.
pub trait BackupLogParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> SnapshotResult<ParsedBackupLogs>;
}
