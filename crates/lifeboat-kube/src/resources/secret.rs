use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lifeboat_core::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};

use super::metadata::ObjectMeta;

/// Core `v1` Secret. Data values are base64 on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default = "core_api_version")]
    pub api_version: String,
    #[serde(default = "secret_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

fn core_api_version() -> String {
    "v1".to_string()
}

fn secret_kind() -> String {
    "Secret".to_string()
}

impl Secret {
    /// Opaque secret holding `value` under `key`.
    pub fn opaque(metadata: ObjectMeta, key: &str, value: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert(key.to_string(), STANDARD.encode(value.as_bytes()));
        Self {
            api_version: core_api_version(),
            kind: secret_kind(),
            metadata,
            secret_type: Some("Opaque".to_string()),
            data,
        }
    }

    pub fn decoded(&self, key: &str) -> SnapshotResult<Option<String>> {
        let Some(encoded) = self.data.get(key) else {
            return Ok(None);
        };
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            SnapshotError::Decode(format!(
                "secret {} key {} is not valid base64: {}",
                self.metadata.name, key, e
            ))
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            SnapshotError::Decode(format!(
                "secret {} key {} is not UTF-8: {}",
                self.metadata.name, key, e
            ))
        })?;
        Ok(Some(text))
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.data
            .insert(key.to_string(), STANDARD.encode(value.as_bytes()));
    }
}
