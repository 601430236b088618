use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lifeboat_core::SnapshotResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object metadata. Fields not modelled here are preserved in `extra` so a
/// read-modify-write cycle sends them back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Drop fields the API server owns, so the object can be created under a
    /// new name.
    pub fn clear_server_fields(&mut self) {
        self.resource_version = None;
        self.creation_timestamp = None;
        for key in ["uid", "generation", "managedFields", "selfLink", "ownerReferences"] {
            self.extra.remove(key);
        }
    }
}

/// Collection response of a list call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

pub fn decode<T: DeserializeOwned>(value: Value) -> SnapshotResult<T> {
    Ok(serde_json::from_value(value)?)
}

pub fn encode<T: Serialize>(resource: &T) -> SnapshotResult<Value> {
    Ok(serde_json::to_value(resource)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_metadata_survives_round_trip() {
        let value = json!({
            "name": "default",
            "namespace": "velero",
            "resourceVersion": "42",
            "uid": "abc",
            "finalizers": ["keep-me"]
        });

        let mut meta: ObjectMeta = serde_json::from_value(value).unwrap();
        assert_eq!(meta.resource_version.as_deref(), Some("42"));
        assert_eq!(serde_json::to_value(&meta).unwrap()["finalizers"][0], "keep-me");

        meta.clear_server_fields();
        let cleared = serde_json::to_value(&meta).unwrap();
        assert!(cleared.get("resourceVersion").is_none());
        assert!(cleared.get("uid").is_none());
        assert_eq!(cleared["finalizers"][0], "keep-me");
    }
}
