use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::snapshot::{JobPhase, SnapshotIssue, VolumeProgress};

/// State of an application restore as shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreDetail {
    pub name: String,
    pub phase: JobPhase,
    pub volumes: Vec<VolumeProgress>,
    pub errors: Vec<SnapshotIssue>,
    pub warnings: Vec<SnapshotIssue>,
}

impl RestoreDetail {
    /// Shell returned before the controller has created the restore resource.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: JobPhase::New,
            volumes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Restore results artifact produced by the backup controller.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResults {
    #[serde(default)]
    pub errors: RestoreResultSet,
    #[serde(default)]
    pub warnings: RestoreResultSet,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResultSet {
    #[serde(default)]
    pub velero: Vec<String>,
    #[serde(default)]
    pub cluster: Vec<String>,
    #[serde(default)]
    pub namespaces: BTreeMap<String, Vec<String>>,
}

impl RestoreResultSet {
    /// One issue per message, scoped to the namespace it was reported for.
    pub fn namespace_issues(&self, title: &str) -> Vec<SnapshotIssue> {
        self.namespaces
            .iter()
            .flat_map(|(namespace, messages)| {
                messages.iter().map(move |message| SnapshotIssue {
                    title: title.to_string(),
                    message: message.clone(),
                    namespace: Some(namespace.clone()),
                })
            })
            .collect()
    }
}
