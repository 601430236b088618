use std::collections::BTreeMap;

use lifeboat_core::constants::VELERO_API_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metadata::ObjectMeta;

pub const BACKUP_STORAGE_LOCATION_KIND: &str = "BackupStorageLocation";

/// Where the backup controller writes backups: bucket, prefix and provider
/// plugin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocation {
    #[serde(default = "velero_api_version")]
    pub api_version: String,
    #[serde(default = "location_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: BackupStorageLocationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationSpec {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub object_storage: ObjectStorageLocation,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageLocation {
    #[serde(default)]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn velero_api_version() -> String {
    VELERO_API_VERSION.to_string()
}

fn location_kind() -> String {
    BACKUP_STORAGE_LOCATION_KIND.to_string()
}

impl BackupStorageLocation {
    pub fn new(metadata: ObjectMeta, spec: BackupStorageLocationSpec) -> Self {
        Self {
            api_version: velero_api_version(),
            kind: location_kind(),
            metadata,
            spec,
            status: None,
        }
    }

    pub fn prefix(&self) -> &str {
        self.spec.object_storage.prefix.as_deref().unwrap_or_default()
    }

    /// Copy of this location under `name`, pointing at `prefix`, ready to be
    /// created: server-owned metadata and status are dropped.
    pub fn derive(&self, name: &str, prefix: String) -> Self {
        let mut derived = self.clone();
        derived.metadata.name = name.to_string();
        derived.metadata.clear_server_fields();
        derived.status = None;
        // Only the global location may be the controller's default.
        derived.spec.extra.remove("default");
        derived.spec.object_storage.prefix = Some(prefix);
        derived
    }
}
