//! Download Protocol
//!
//! Large artifacts (backup logs, restore results) are obtained through an
//! ephemeral `DownloadRequest`: create it, poll until the controller fills in
//! a signed URL, delete it, then fetch and gunzip the artifact.

use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use flate2::read::GzDecoder;
use lifeboat_core::models::{ParsedBackupLogs, RestoreResults};
use lifeboat_core::naming::download_request_name;
use lifeboat_core::{DownloadPolicy, SnapshotError, SnapshotResult};
use lifeboat_kube::resources::{
    decode, encode, paths, DownloadRequest, DownloadTargetKind, ObjectMeta,
};
use lifeboat_kube::{Method, ResourceApi};
use tokio_util::sync::CancellationToken;

use crate::collaborators::BackupLogParser;

pub struct DownloadProtocol {
    velero: Arc<dyn ResourceApi>,
    http: reqwest::Client,
    policy: DownloadPolicy,
    log_parser: Arc<dyn BackupLogParser>,
}

impl DownloadProtocol {
    pub fn new(
        velero: Arc<dyn ResourceApi>,
        http: reqwest::Client,
        policy: DownloadPolicy,
        log_parser: Arc<dyn BackupLogParser>,
    ) -> Self {
        Self {
            velero,
            http,
            policy,
            log_parser,
        }
    }

    /// Signed URL for `kind` of `target_name`, waiting at most
    /// `max_attempts` polls.
    pub async fn get_download_url(
        &self,
        kind: DownloadTargetKind,
        target_name: &str,
    ) -> SnapshotResult<String> {
        self.get_download_url_with_cancel(kind, target_name, &CancellationToken::new())
            .await
    }

    /// Like [`Self::get_download_url`], but the wait between polls ends early
    /// with `Cancelled` once `cancel` fires.
    pub async fn get_download_url_with_cancel(
        &self,
        kind: DownloadTargetKind,
        target_name: &str,
        cancel: &CancellationToken,
    ) -> SnapshotResult<String> {
        let name = download_request_name(target_name, &kind.to_string(), Utc::now().timestamp());
        let request = DownloadRequest::new(
            ObjectMeta::named(&name, self.velero.namespace()),
            kind,
            target_name,
        );
        self.velero
            .request(
                Method::POST,
                paths::DOWNLOAD_REQUESTS,
                Some(&encode(&request)?),
            )
            .await?;

        let path = paths::named(paths::DOWNLOAD_REQUESTS, &name);

        for attempt in 1..=self.policy.max_attempts {
            let current = match self.poll(&path).await {
                Ok(current) => current,
                Err(e) => {
                    self.discard(&path).await;
                    return Err(e);
                }
            };

            if let Some(url) = current.download_url() {
                let url = url.to_string();
                self.discard(&path).await;
                tracing::debug!(
                    kind = %kind,
                    target = %target_name,
                    attempts = attempt,
                    "Download URL ready"
                );
                return Ok(url);
            }

            if attempt == self.policy.max_attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.discard(&path).await;
                    return Err(SnapshotError::Cancelled(format!(
                        "waiting for {} download URL for {}",
                        kind, target_name
                    )));
                }
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }

        tracing::warn!(
            kind = %kind,
            target = %target_name,
            max_attempts = self.policy.max_attempts,
            "Timed out waiting for download URL"
        );
        self.discard(&path).await;

        Err(SnapshotError::Timeout {
            kind: kind.to_string(),
            target: target_name.to_string(),
        })
    }

    async fn poll(&self, path: &str) -> SnapshotResult<DownloadRequest> {
        decode(self.velero.request(Method::GET, path, None).await?)
    }

    // Best-effort: failures are logged, not returned.
    async fn discard(&self, path: &str) {
        if let Err(e) = self.velero.request(Method::DELETE, path, None).await {
            tracing::warn!(path = %path, error = %e, "Failed to delete download request");
        }
    }

    /// Fetch a signed URL and gunzip the body.
    pub async fn fetch_artifact(&self, url: &str) -> SnapshotResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SnapshotError::Transport(format!("Failed to fetch artifact: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Artifact download failed");
            return Err(SnapshotError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let compressed = response
            .bytes()
            .await
            .map_err(|e| SnapshotError::Transport(format!("Failed to read artifact: {}", e)))?;

        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut decoded)?;
        Ok(decoded)
    }

    pub async fn get_backup_logs(&self, backup_name: &str) -> SnapshotResult<ParsedBackupLogs> {
        let url = self
            .get_download_url(DownloadTargetKind::BackupLog, backup_name)
            .await?;
        let raw = self.fetch_artifact(&url).await?;
        self.log_parser.parse(&raw)
    }

    pub async fn get_restore_results(&self, restore_name: &str) -> SnapshotResult<RestoreResults> {
        let url = self
            .get_download_url(DownloadTargetKind::RestoreResults, restore_name)
            .await?;
        let raw = self.fetch_artifact(&url).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
