//! Stable wire contract: annotation keys, label keys and fixed resource names.
//!
//! Renaming any of these requires a migration of existing backups.

/// Label and annotation carrying the owning application's slug.
pub const APP_SLUG_KEY: &str = "lifeboat.io/app-slug";
pub const APP_ID_ANNOTATION: &str = "lifeboat.io/app-id";
pub const CLUSTER_ID_ANNOTATION: &str = "lifeboat.io/cluster-id";
/// Sequence number of the application version installed when the backup ran.
pub const APP_SEQUENCE_ANNOTATION: &str = "lifeboat.io/app-sequence";
pub const SNAPSHOT_TRIGGER_ANNOTATION: &str = "lifeboat.io/snapshot-trigger";
pub const VOLUME_COUNT_ANNOTATION: &str = "lifeboat.io/snapshot-volume-count";
pub const VOLUME_SUCCESS_COUNT_ANNOTATION: &str = "lifeboat.io/snapshot-volume-success-count";
pub const VOLUME_BYTES_ANNOTATION: &str = "lifeboat.io/snapshot-volume-bytes";

/// Labels set by the backup controller on per-volume sub-resources.
pub const BACKUP_NAME_LABEL: &str = "velero.io/backup-name";
pub const RESTORE_NAME_LABEL: &str = "velero.io/restore-name";

pub const VELERO_API_VERSION: &str = "velero.io/v1";

pub const AWS_CREDENTIALS_SECRET: &str = "aws-credentials";
pub const AZURE_CREDENTIALS_SECRET: &str = "azure-credentials";
pub const GOOGLE_CREDENTIALS_SECRET: &str = "google-credentials";
/// Data key holding the provider credential blob inside each secret.
pub const CREDENTIALS_SECRET_KEY: &str = "cloud";

/// Returned in place of secret values on read; never persisted on write.
pub const REDACTED_SENTINEL: &str = "--- REDACTED ---";

/// Maximum length of a DNS label (and of a label value).
pub const MAX_DNS_LABEL_LENGTH: usize = 63;
