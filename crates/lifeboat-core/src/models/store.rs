use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};

/// Logical snapshot-store configuration shared by the global storage location
/// and every per-application location derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStoreConfig {
    pub bucket: String,
    #[serde(default)]
    pub path_prefix: String,
    pub credentials: StoreCredentials,
}

/// Provider-specific connection settings. Exactly one provider is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum StoreCredentials {
    #[serde(rename = "S3AWS")]
    S3Aws(AwsStore),
    S3Compatible(S3CompatibleStore),
    Azure(AzureStore),
    Google(GoogleStore),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsStore {
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3CompatibleStore {
    #[serde(default)]
    pub region: String,
    pub endpoint: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureStore {
    pub resource_group: String,
    pub storage_account: String,
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub cloud_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStore {
    /// Service-account key JSON, kept verbatim.
    #[serde(default)]
    pub service_account: String,
}

impl StoreCredentials {
    /// Display name of the configured provider.
    pub fn provider_name(&self) -> &'static str {
        match self {
            StoreCredentials::S3Aws(_) => "S3AWS",
            StoreCredentials::S3Compatible(_) => "S3Compatible",
            StoreCredentials::Azure(_) => "Azure",
            StoreCredentials::Google(_) => "Google",
        }
    }
}

impl SnapshotStoreConfig {
    pub fn validate(&self) -> SnapshotResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(SnapshotError::Validation("Bucket is required".to_string()));
        }

        let missing = match &self.credentials {
            StoreCredentials::S3Aws(aws) if aws.region.trim().is_empty() => Some("region"),
            StoreCredentials::S3Compatible(s3) if s3.endpoint.trim().is_empty() => {
                Some("endpoint")
            }
            StoreCredentials::Azure(azure) if azure.resource_group.trim().is_empty() => {
                Some("resourceGroup")
            }
            StoreCredentials::Azure(azure) if azure.storage_account.trim().is_empty() => {
                Some("storageAccount")
            }
            StoreCredentials::Azure(azure) if azure.subscription_id.trim().is_empty() => {
                Some("subscriptionId")
            }
            _ => None,
        };

        match missing {
            Some(field) => Err(SnapshotError::Validation(format!(
                "{} is required for provider {}",
                field,
                self.credentials.provider_name()
            ))),
            None => Ok(()),
        }
    }
}
