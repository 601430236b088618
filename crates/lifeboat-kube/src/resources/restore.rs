use chrono::{DateTime, Utc};
use lifeboat_core::constants::VELERO_API_VERSION;
use lifeboat_core::models::JobPhase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metadata::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restore {
    #[serde(default = "velero_api_version")]
    pub api_version: String,
    #[serde(default = "restore_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RestoreSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RestoreStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    #[serde(default)]
    pub backup_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub warnings: u64,
}

fn velero_api_version() -> String {
    VELERO_API_VERSION.to_string()
}

fn restore_kind() -> String {
    "Restore".to_string()
}

impl Restore {
    pub fn new(metadata: ObjectMeta, backup_name: impl Into<String>) -> Self {
        Self {
            api_version: velero_api_version(),
            kind: restore_kind(),
            metadata,
            spec: RestoreSpec {
                backup_name: backup_name.into(),
                extra: Map::new(),
            },
            status: None,
        }
    }

    pub fn phase(&self) -> JobPhase {
        JobPhase::from_status(self.status.as_ref().and_then(|s| s.phase.as_deref()))
    }
}

/// Asks the controller to delete a backup and its stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBackupRequest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DeleteBackupRequestSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBackupRequestSpec {
    pub backup_name: String,
}

impl DeleteBackupRequest {
    pub fn new(metadata: ObjectMeta, backup_name: impl Into<String>) -> Self {
        Self {
            api_version: velero_api_version(),
            kind: "DeleteBackupRequest".to_string(),
            metadata,
            spec: DeleteBackupRequestSpec {
                backup_name: backup_name.into(),
            },
        }
    }
}
