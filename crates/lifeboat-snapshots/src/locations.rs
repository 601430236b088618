//! Storage Location Manager
//!
//! One logical snapshot-store configuration fans out to N+1 storage locations:
//! the global location and one location per application slug. Per-application
//! locations share the global provider and config; their prefix is always
//! `join(global prefix, slug)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use lifeboat_core::constants::APP_SLUG_KEY;
use lifeboat_core::models::{
    AwsStore, AzureStore, GoogleStore, S3CompatibleStore, SnapshotStoreConfig, StoreCredentials,
};
use lifeboat_core::{join_prefix, SnapshotError, SnapshotResult};
use lifeboat_kube::resources::{
    decode, encode, paths, BackupStorageLocation, BackupStorageLocationSpec, List, ObjectMeta,
};
use lifeboat_kube::{Method, ResourceApi};

use crate::credentials::{AwsCredentials, AzureCredentials, CredentialReconciler, GoogleCredentials};

const PROVIDER_AWS: &str = "aws";
const PROVIDER_AZURE: &str = "azure";
const PROVIDER_GCP: &str = "gcp";

pub struct StorageLocationManager {
    velero: Arc<dyn ResourceApi>,
    core: Arc<dyn ResourceApi>,
    global_name: String,
}

impl StorageLocationManager {
    pub fn new(
        velero: Arc<dyn ResourceApi>,
        core: Arc<dyn ResourceApi>,
        global_name: impl Into<String>,
    ) -> Self {
        Self {
            velero,
            core,
            global_name: global_name.into(),
        }
    }

    pub fn global_name(&self) -> &str {
        &self.global_name
    }

    /// The configured snapshot store with redacted credentials, or `None`
    /// when no global location exists.
    pub async fn read(&self) -> SnapshotResult<Option<SnapshotStoreConfig>> {
        let list = match self
            .velero
            .request(Method::GET, paths::BACKUP_STORAGE_LOCATIONS, None)
            .await
        {
            Ok(list) => list,
            Err(e) if e.is_not_found() => {
                return Err(SnapshotError::NotInstalled(format!(
                    "no BackupStorageLocation resources in namespace {}",
                    self.velero.namespace()
                )))
            }
            Err(e) => return Err(e),
        };

        let list: List<BackupStorageLocation> = decode(list)?;
        let Some(global) = list
            .items
            .into_iter()
            .find(|location| location.metadata.name == self.global_name)
        else {
            return Ok(None);
        };

        Ok(Some(self.store_config(&global).await?))
    }

    async fn store_config(
        &self,
        location: &BackupStorageLocation,
    ) -> SnapshotResult<SnapshotStoreConfig> {
        let config = &location.spec.config;
        let setting = |key: &str| config.get(key).cloned().unwrap_or_default();

        let credentials = match location.spec.provider.as_str() {
            PROVIDER_AWS => {
                let stored = CredentialReconciler::<AwsCredentials>::new(self.core.clone())
                    .read_redacted()
                    .await?;
                match config.get("s3Url").filter(|url| !url.is_empty()) {
                    Some(endpoint) => StoreCredentials::S3Compatible(S3CompatibleStore {
                        region: setting("region"),
                        endpoint: endpoint.clone(),
                        access_key_id: stored.access_key_id,
                        secret_access_key: stored.secret_access_key,
                    }),
                    None => StoreCredentials::S3Aws(AwsStore {
                        region: setting("region"),
                        access_key_id: stored.access_key_id,
                        secret_access_key: stored.secret_access_key,
                    }),
                }
            }
            PROVIDER_AZURE => {
                let stored = CredentialReconciler::<AzureCredentials>::new(self.core.clone())
                    .read_redacted()
                    .await?;
                let resource_group = Some(setting("resourceGroup"))
                    .filter(|rg| !rg.is_empty())
                    .unwrap_or(stored.resource_group);
                let subscription_id = Some(setting("subscriptionId"))
                    .filter(|id| !id.is_empty())
                    .unwrap_or(stored.subscription_id);
                StoreCredentials::Azure(AzureStore {
                    resource_group,
                    storage_account: setting("storageAccount"),
                    subscription_id,
                    tenant_id: stored.tenant_id,
                    client_id: stored.client_id,
                    client_secret: stored.client_secret,
                    cloud_name: stored.cloud_name,
                })
            }
            PROVIDER_GCP => {
                let stored = CredentialReconciler::<GoogleCredentials>::new(self.core.clone())
                    .read_redacted()
                    .await?;
                StoreCredentials::Google(GoogleStore {
                    service_account: stored.service_account,
                })
            }
            other => return Err(SnapshotError::UnsupportedProvider(other.to_string())),
        };

        Ok(SnapshotStoreConfig {
            bucket: location.spec.object_storage.bucket.clone(),
            path_prefix: location.prefix().to_string(),
            credentials,
        })
    }

    /// Reconcile the global location, its credential secret and one location
    /// per slug from `config`.
    pub async fn save(&self, config: &SnapshotStoreConfig, slugs: &[String]) -> SnapshotResult<()> {
        config.validate()?;

        let global_path = paths::named(paths::BACKUP_STORAGE_LOCATIONS, &self.global_name);
        let existing = match self.velero.request(Method::GET, &global_path, None).await {
            Ok(value) => Some(decode::<BackupStorageLocation>(value)?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let global = match existing {
            Some(mut location) => {
                apply_store_config(&mut location.spec, config);
                tracing::info!(location = %self.global_name, "Updating global storage location");
                self.velero
                    .request(Method::PUT, &global_path, Some(&encode(&location)?))
                    .await?;
                location
            }
            None => {
                let mut spec = BackupStorageLocationSpec::default();
                apply_store_config(&mut spec, config);
                let location = BackupStorageLocation::new(
                    ObjectMeta::named(&self.global_name, self.velero.namespace()),
                    spec,
                );
                tracing::info!(location = %self.global_name, "Creating global storage location");
                self.velero
                    .request(
                        Method::POST,
                        paths::BACKUP_STORAGE_LOCATIONS,
                        Some(&encode(&location)?),
                    )
                    .await?;
                location
            }
        };

        self.write_credentials(&config.credentials).await?;

        for slug in slugs {
            self.sync_app_location(&global, &config.path_prefix, slug).await?;
        }

        tracing::info!(
            provider = config.credentials.provider_name(),
            app_locations = slugs.len(),
            "Snapshot store saved"
        );
        Ok(())
    }

    /// Fail unless both the global location and the location of `slug` exist.
    pub async fn ensure_app_location(&self, slug: &str) -> SnapshotResult<()> {
        if !self.location_exists(&self.global_name).await? {
            return Err(SnapshotError::PreconditionFailed(
                "no snapshot store is configured".to_string(),
            ));
        }
        if !self.location_exists(slug).await? {
            return Err(SnapshotError::PreconditionFailed(format!(
                "application {} has no storage location; save the snapshot store again",
                slug
            )));
        }
        Ok(())
    }

    async fn location_exists(&self, name: &str) -> SnapshotResult<bool> {
        let path = paths::named(paths::BACKUP_STORAGE_LOCATIONS, name);
        match self.velero.request(Method::GET, &path, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn write_credentials(&self, credentials: &StoreCredentials) -> SnapshotResult<()> {
        match credentials {
            StoreCredentials::S3Aws(AwsStore {
                access_key_id,
                secret_access_key,
                ..
            })
            | StoreCredentials::S3Compatible(S3CompatibleStore {
                access_key_id,
                secret_access_key,
                ..
            }) => {
                CredentialReconciler::<AwsCredentials>::new(self.core.clone())
                    .write(AwsCredentials {
                        access_key_id: access_key_id.clone(),
                        secret_access_key: secret_access_key.clone(),
                    })
                    .await?;
            }
            StoreCredentials::Azure(azure) => {
                CredentialReconciler::<AzureCredentials>::new(self.core.clone())
                    .write(AzureCredentials {
                        subscription_id: azure.subscription_id.clone(),
                        tenant_id: azure.tenant_id.clone(),
                        client_id: azure.client_id.clone(),
                        client_secret: azure.client_secret.clone(),
                        resource_group: azure.resource_group.clone(),
                        cloud_name: azure.cloud_name.clone(),
                    })
                    .await?;
            }
            StoreCredentials::Google(google) => {
                CredentialReconciler::<GoogleCredentials>::new(self.core.clone())
                    .write(GoogleCredentials {
                        service_account: google.service_account.clone(),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn sync_app_location(
        &self,
        global: &BackupStorageLocation,
        prefix: &str,
        slug: &str,
    ) -> SnapshotResult<()> {
        let path = paths::named(paths::BACKUP_STORAGE_LOCATIONS, slug);
        let app_prefix = join_prefix(prefix, slug);
        let response = self
            .velero
            .unhandled_request(Method::GET, &path, None)
            .await?;

        match response.status {
            200 => {
                let mut location: BackupStorageLocation = decode(response.body)?;
                location.spec = global.derive(slug, app_prefix).spec;
                tracing::debug!(slug = %slug, "Updating application storage location");
                self.velero
                    .request(Method::PUT, &path, Some(&encode(&location)?))
                    .await?;
            }
            404 => {
                let mut location = global.derive(slug, app_prefix);
                location
                    .metadata
                    .labels
                    .insert(APP_SLUG_KEY.to_string(), slug.to_string());
                tracing::debug!(slug = %slug, "Creating application storage location");
                self.velero
                    .request(
                        Method::POST,
                        paths::BACKUP_STORAGE_LOCATIONS,
                        Some(&encode(&location)?),
                    )
                    .await?;
            }
            status => {
                tracing::error!(
                    slug = %slug,
                    status = status,
                    body = %response.body,
                    "Failed to read application storage location"
                );
                return Err(SnapshotError::LocationSync {
                    slug: slug.to_string(),
                    status,
                });
            }
        }

        Ok(())
    }
}

/// Write the provider, bucket, prefix and provider config of `config` into
/// `spec`, leaving other spec fields alone.
fn apply_store_config(spec: &mut BackupStorageLocationSpec, config: &SnapshotStoreConfig) {
    let mut settings = BTreeMap::new();
    let provider = match &config.credentials {
        StoreCredentials::S3Aws(aws) => {
            settings.insert("region".to_string(), aws.region.clone());
            PROVIDER_AWS
        }
        StoreCredentials::S3Compatible(s3) => {
            if !s3.region.is_empty() {
                settings.insert("region".to_string(), s3.region.clone());
            }
            settings.insert("s3Url".to_string(), s3.endpoint.clone());
            settings.insert("s3ForcePathStyle".to_string(), "true".to_string());
            PROVIDER_AWS
        }
        StoreCredentials::Azure(azure) => {
            settings.insert("resourceGroup".to_string(), azure.resource_group.clone());
            settings.insert("storageAccount".to_string(), azure.storage_account.clone());
            settings.insert("subscriptionId".to_string(), azure.subscription_id.clone());
            PROVIDER_AZURE
        }
        StoreCredentials::Google(_) => PROVIDER_GCP,
    };

    spec.provider = provider.to_string();
    spec.config = settings;
    spec.object_storage.bucket = config.bucket.clone();
    let prefix = config.path_prefix.trim_matches('/');
    spec.object_storage.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
}
