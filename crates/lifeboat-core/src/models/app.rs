use serde::{Deserialize, Serialize};

/// Application record owned by the console's app store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// Namespace the application is deployed to.
    pub namespace: String,
    /// Sequence currently deployed, if any.
    pub current_sequence: Option<i64>,
    /// Name of the restore currently in flight for this application.
    pub restore_in_progress_name: Option<String>,
    /// Retention as a duration string (`720h`); the configured default applies
    /// when unset.
    pub snapshot_ttl: Option<String>,
}

/// A previously deployed version of an application in one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    pub sequence: i64,
    pub version_label: Option<String>,
}

/// Schedule and retention of automatic snapshots for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSettings {
    /// Cron expression, or `None` when automatic snapshots are disabled.
    pub schedule: Option<String>,
    /// Human-readable retention, e.g. `1 month`.
    pub ttl: String,
}
