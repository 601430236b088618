//! Credential Reconciler
//!
//! Each cloud provider keeps its credentials in one fixed-name secret in the
//! backup controller namespace, as a single text blob under the `cloud` key.
//! Reads parse the blob (a missing secret reads as empty credentials). Writes
//! never persist the redaction sentinel: any field still carrying it gets the
//! previously stored value. Credentials that end up empty delete the secret.

mod aws;
mod azure;
mod google;

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use lifeboat_core::constants::{CREDENTIALS_SECRET_KEY, REDACTED_SENTINEL};
use lifeboat_core::{SnapshotError, SnapshotResult};
use lifeboat_kube::resources::{decode, encode, paths, ObjectMeta, Secret};
use lifeboat_kube::{Method, ResourceApi};
use regex::Regex;

pub use aws::AwsCredentials;
pub use azure::AzureCredentials;
pub use google::GoogleCredentials;

/// Provider-specific credential blob format.
pub trait ProviderCredentials: Debug + Default + Clone + PartialEq + Send + Sync {
    /// Name of the secret holding this provider's blob.
    const SECRET_NAME: &'static str;

    fn parse(blob: &str) -> SnapshotResult<Self>;

    fn render(&self) -> String;

    /// No identity and no secret: nothing worth storing.
    fn is_empty(&self) -> bool;

    /// Copy with secret fields replaced by the redaction sentinel.
    fn redacted(&self) -> Self;

    /// Replace fields carrying the redaction sentinel with `previous` values.
    fn restore_redacted(&mut self, previous: &Self);
}

pub(crate) fn redact(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        REDACTED_SENTINEL.to_string()
    }
}

pub(crate) fn keep_previous(value: &mut String, previous: &str) {
    if value == REDACTED_SENTINEL {
        *value = previous.to_string();
    }
}

/// Value of the first `key = value` line of `blob`, or empty.
pub(crate) fn line_value(blob: &str, key: &str) -> SnapshotResult<String> {
    let pattern = format!(r"(?m)^[ \t]*{}[ \t]*=[ \t]*(.*?)[ \t]*\r?$", regex::escape(key));
    let re = Regex::new(&pattern).map_err(|e| SnapshotError::Internal(e.to_string()))?;
    Ok(re
        .captures(blob)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

/// Reads and writes one provider's credential secret.
pub struct CredentialReconciler<C> {
    core: Arc<dyn ResourceApi>,
    _provider: PhantomData<fn() -> C>,
}

impl<C: ProviderCredentials> CredentialReconciler<C> {
    pub fn new(core: Arc<dyn ResourceApi>) -> Self {
        Self {
            core,
            _provider: PhantomData,
        }
    }

    fn path() -> String {
        paths::named(paths::SECRETS, C::SECRET_NAME)
    }

    async fn current_secret(&self) -> SnapshotResult<Option<Secret>> {
        match self.core.request(Method::GET, &Self::path(), None).await {
            Ok(value) => Ok(Some(decode(value)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn credentials_of(secret: Option<&Secret>) -> SnapshotResult<C> {
        match secret {
            Some(secret) => match secret.decoded(CREDENTIALS_SECRET_KEY)? {
                Some(blob) => C::parse(&blob),
                None => Ok(C::default()),
            },
            None => Ok(C::default()),
        }
    }

    /// Stored credentials; empty when the secret does not exist.
    pub async fn read(&self) -> SnapshotResult<C> {
        let secret = self.current_secret().await?;
        Self::credentials_of(secret.as_ref())
    }

    pub async fn read_redacted(&self) -> SnapshotResult<C> {
        Ok(self.read().await?.redacted())
    }

    /// Store `credentials`, returning the written secret, or `None` when the
    /// credentials were empty and the secret was removed.
    ///
    /// Updates carry the secret's resourceVersion, so a concurrent edit fails
    /// with `Conflict` instead of being overwritten.
    pub async fn write(&self, mut credentials: C) -> SnapshotResult<Option<Secret>> {
        let existing = self.current_secret().await?;
        let previous = Self::credentials_of(existing.as_ref())?;
        credentials.restore_redacted(&previous);

        if credentials.is_empty() {
            if existing.is_some() {
                tracing::info!(secret = C::SECRET_NAME, "Deleting empty credentials secret");
                match self.core.request(Method::DELETE, &Self::path(), None).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
            return Ok(None);
        }

        let blob = credentials.render();
        let written = match existing {
            Some(mut secret) => {
                secret.set(CREDENTIALS_SECRET_KEY, &blob);
                tracing::info!(secret = C::SECRET_NAME, "Updating credentials secret");
                self.core
                    .request(Method::PUT, &Self::path(), Some(&encode(&secret)?))
                    .await?
            }
            None => {
                let secret = Secret::opaque(
                    ObjectMeta::named(C::SECRET_NAME, self.core.namespace()),
                    CREDENTIALS_SECRET_KEY,
                    &blob,
                );
                tracing::info!(secret = C::SECRET_NAME, "Creating credentials secret");
                self.core
                    .request(Method::POST, paths::SECRETS, Some(&encode(&secret)?))
                    .await?
            }
        };

        Ok(Some(decode(written)?))
    }
}
