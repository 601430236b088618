//! Lifeboat Snapshots
//!
//! Snapshot orchestration on top of the in-cluster backup controller:
//! snapshot-store configuration and credential secrets, backup creation and
//! summaries, the signed-URL download protocol for logs and results, and
//! restore validation and tracking. Every service takes its resource clients
//! explicitly; console-owned state is reached through the traits in
//! [`collaborators`].

pub mod backup;
pub mod collaborators;
pub mod credentials;
pub mod download;
pub mod locations;
pub mod logs;
pub mod restore;
pub mod schedule;
pub mod summarizer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backup::BackupService;
pub use collaborators::{AppStore, BackupLogParser, ScheduleStore};
pub use credentials::{
    AwsCredentials, AzureCredentials, CredentialReconciler, GoogleCredentials, ProviderCredentials,
};
pub use download::DownloadProtocol;
pub use locations::StorageLocationManager;
pub use logs::LogfmtBackupLogParser;
pub use restore::RestoreOrchestrator;
pub use schedule::{validate_schedule, ScheduleService};
pub use summarizer::BackupSummarizer;
