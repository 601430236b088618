use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use lifeboat_core::constants::VELERO_API_VERSION;
use serde::{Deserialize, Serialize};

use super::metadata::ObjectMeta;

/// Artifact kinds the controller can produce a signed URL for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadTargetKind {
    BackupLog,
    BackupContents,
    BackupVolumeSnapshots,
    BackupResourceList,
    RestoreLog,
    RestoreResults,
}

impl Display for DownloadTargetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let kind = match self {
            DownloadTargetKind::BackupLog => "BackupLog",
            DownloadTargetKind::BackupContents => "BackupContents",
            DownloadTargetKind::BackupVolumeSnapshots => "BackupVolumeSnapshots",
            DownloadTargetKind::BackupResourceList => "BackupResourceList",
            DownloadTargetKind::RestoreLog => "RestoreLog",
            DownloadTargetKind::RestoreResults => "RestoreResults",
        };
        write!(f, "{}", kind)
    }
}

/// Ephemeral request for a signed download URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DownloadRequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DownloadRequestStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequestSpec {
    pub target: DownloadTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTarget {
    pub kind: DownloadTargetKind,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(
        default,
        rename = "downloadURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl DownloadRequest {
    pub fn new(metadata: ObjectMeta, kind: DownloadTargetKind, target_name: &str) -> Self {
        Self {
            api_version: VELERO_API_VERSION.to_string(),
            kind: "DownloadRequest".to_string(),
            metadata,
            spec: DownloadRequestSpec {
                target: DownloadTarget {
                    kind,
                    name: target_name.to_string(),
                },
            },
            status: None,
        }
    }

    /// Signed URL, once the controller has processed the request.
    pub fn download_url(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.download_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}
