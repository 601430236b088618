//! Shared setup for snapshot integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lifeboat_core::DownloadPolicy;
use lifeboat_kube::testing::MockCluster;
use lifeboat_kube::ResourceApi;
use lifeboat_snapshots::testing::MockAppStore;
use lifeboat_snapshots::{
    BackupSummarizer, DownloadProtocol, LogfmtBackupLogParser, RestoreOrchestrator,
    StorageLocationManager,
};

pub struct TestCluster {
    pub cluster: MockCluster,
    pub locations: StorageLocationManager,
    pub summarizer: BackupSummarizer,
}

impl TestCluster {
    pub fn new() -> Self {
        let cluster = MockCluster::new("velero");
        let api: Arc<dyn ResourceApi> = Arc::new(cluster.clone());

        Self {
            locations: StorageLocationManager::new(api.clone(), api.clone(), "default"),
            summarizer: BackupSummarizer::new(api, downloads(&cluster)),
            cluster,
        }
    }

    pub fn restores(&self, apps: &MockAppStore) -> RestoreOrchestrator {
        RestoreOrchestrator::new(
            Arc::new(self.cluster.clone()),
            Arc::new(apps.clone()),
            downloads(&self.cluster),
        )
    }
}

fn downloads(cluster: &MockCluster) -> Arc<DownloadProtocol> {
    Arc::new(DownloadProtocol::new(
        Arc::new(cluster.clone()),
        reqwest::Client::new(),
        DownloadPolicy {
            max_attempts: 3,
            poll_interval: Duration::from_millis(1),
        },
        Arc::new(LogfmtBackupLogParser),
    ))
}
