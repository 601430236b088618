//! Shared plumbing for the `lifeboat` operator CLI: tracing setup, service
//! wiring from configuration and table rendering.

use std::sync::Arc;

use async_trait::async_trait;
use lifeboat_core::models::{App, AppVersion, Snapshot};
use lifeboat_core::{Config, SnapshotError, SnapshotResult};
use lifeboat_kube::{ClusterConnection, ResourceApi, ResourceClient};
use lifeboat_snapshots::{
    AppStore, BackupService, BackupSummarizer, DownloadProtocol, LogfmtBackupLogParser,
    RestoreOrchestrator, StorageLocationManager,
};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// The CLI runs outside the console and has no application records.
/// Operations that need one fail with a configuration error.
pub struct DetachedAppStore;

impl DetachedAppStore {
    fn unavailable() -> SnapshotError {
        SnapshotError::Configuration(
            "application records are not available from the command line".to_string(),
        )
    }
}

#[async_trait]
impl AppStore for DetachedAppStore {
    async fn get_app(&self, _app_id: &str) -> SnapshotResult<App> {
        Err(Self::unavailable())
    }

    async fn list_past_versions(
        &self,
        _app_id: &str,
        _cluster_id: &str,
    ) -> SnapshotResult<Vec<AppVersion>> {
        Err(Self::unavailable())
    }

    async fn update_restore_in_progress_marker(
        &self,
        _app_id: &str,
        _restore_name: Option<&str>,
    ) -> SnapshotResult<()> {
        Err(Self::unavailable())
    }

    async fn update_snapshot_ttl(&self, _app_id: &str, _ttl: &str) -> SnapshotResult<()> {
        Err(Self::unavailable())
    }
}

/// Snapshot services wired to one cluster.
pub struct Services {
    pub locations: Arc<StorageLocationManager>,
    pub summarizer: BackupSummarizer,
    pub downloads: Arc<DownloadProtocol>,
    pub backups: BackupService,
    pub restores: RestoreOrchestrator,
}

impl Services {
    pub fn connect(config: &Config) -> SnapshotResult<Self> {
        let connection = ClusterConnection::from_config(config)?;
        let velero: Arc<dyn ResourceApi> = Arc::new(ResourceClient::velero(
            connection.clone(),
            &config.velero_namespace,
        ));
        let core: Arc<dyn ResourceApi> =
            Arc::new(ResourceClient::core(connection, &config.velero_namespace));

        // Signed artifact URLs point at object storage, not the API server.
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| {
                SnapshotError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_clients(velero, core, http, config))
    }

    pub fn with_clients(
        velero: Arc<dyn ResourceApi>,
        core: Arc<dyn ResourceApi>,
        http: reqwest::Client,
        config: &Config,
    ) -> Self {
        let apps: Arc<dyn AppStore> = Arc::new(DetachedAppStore);
        let downloads = Arc::new(DownloadProtocol::new(
            velero.clone(),
            http,
            config.download,
            Arc::new(LogfmtBackupLogParser),
        ));
        let locations = Arc::new(StorageLocationManager::new(
            velero.clone(),
            core,
            &config.global_location_name,
        ));

        Self {
            summarizer: BackupSummarizer::new(velero.clone(), downloads.clone()),
            backups: BackupService::new(
                velero.clone(),
                apps.clone(),
                locations.clone(),
                &config.default_snapshot_ttl,
            ),
            restores: RestoreOrchestrator::new(velero, apps, downloads.clone()),
            locations,
            downloads,
        }
    }
}

pub fn snapshot_table(snapshots: &[Snapshot]) -> String {
    let mut out = format!(
        "{:<40} {:<16} {:<12} {:>8} {:>10} {:>20}\n",
        "Name", "Status", "Trigger", "Volumes", "Size", "Started"
    );
    out.push_str(&"-".repeat(111));
    out.push('\n');

    for snapshot in snapshots {
        out.push_str(&format!(
            "{:<40} {:<16} {:<12} {:>8} {:>10} {:>20}\n",
            truncate_string(&snapshot.name, 40),
            snapshot.status.to_string(),
            snapshot
                .trigger
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            format!(
                "{}/{}",
                snapshot.volume_success_count, snapshot.volume_count
            ),
            snapshot.volume_size_human,
            snapshot
                .started
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeboat_core::models::{JobPhase, SnapshotTrigger};

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn snapshot_table_rows() {
        let snapshot = Snapshot {
            name: "app1-1700000000".to_string(),
            status: JobPhase::PartiallyFailed,
            trigger: Some(SnapshotTrigger::Schedule),
            app_slug: Some("app1".to_string()),
            sequence: Some(4),
            started: None,
            finished: None,
            expires_at: None,
            volume_count: 3,
            volume_success_count: 2,
            volume_bytes: 1024,
            volume_size_human: "1.02 kB".to_string(),
        };

        let table = snapshot_table(&[snapshot]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Name"));
        assert!(lines[2].contains("PartiallyFailed"));
        assert!(lines[2].contains("schedule"));
        assert!(lines[2].contains("2/3"));
        assert!(lines[2].contains("1.02 kB"));
    }

    #[tokio::test]
    async fn detached_store_refuses_app_operations() {
        let err = DetachedAppStore.get_app("a1").await.unwrap_err();
        assert!(matches!(err, SnapshotError::Configuration(_)));
    }
}
