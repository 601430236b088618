//! Error types module
//!
//! All snapshot, restore and credential operations fail with [`SnapshotError`].
//! Each variant self-describes how it should be presented to an operator through
//! [`ErrorMetadata`]: user-visible validation and precondition failures keep
//! their message verbatim, while unexpected backend responses surface a generic
//! message and are logged with the full response body.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like conflicts or timeouts
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PERMISSION_DENIED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the operator
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the operator
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: cannot {method} {path} in namespace {namespace}")]
    PermissionDenied {
        method: String,
        path: String,
        namespace: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backup controller not installed: {0}")]
    NotInstalled(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out waiting for {kind} download URL for {target}")]
    Timeout { kind: String, target: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Unsupported storage provider: {0}")]
    UnsupportedProvider(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to sync storage location for {slug}: status {status}")]
    LocationSync { slug: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::Decode(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn snapshot_error_static_metadata(
    err: &SnapshotError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        SnapshotError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check the submitted values and try again"),
            false,
            LogLevel::Debug,
        ),
        SnapshotError::PermissionDenied { .. } => (
            403,
            "PERMISSION_DENIED",
            false,
            Some("Grant the service account access to the named resource"),
            false,
            LogLevel::Warn,
        ),
        SnapshotError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource name exists"),
            false,
            LogLevel::Debug,
        ),
        SnapshotError::NotInstalled(_) => (
            404,
            "BACKUP_CONTROLLER_NOT_INSTALLED",
            false,
            Some("Install the backup controller in the cluster"),
            false,
            LogLevel::Debug,
        ),
        SnapshotError::PreconditionFailed(_) => (
            412,
            "PRECONDITION_FAILED",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        SnapshotError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Reload the resource and retry"),
            false,
            LogLevel::Warn,
        ),
        SnapshotError::Timeout { .. } => (
            504,
            "TRANSPORT_TIMEOUT",
            true,
            Some("Check that the backup controller is running and retry"),
            false,
            LogLevel::Warn,
        ),
        SnapshotError::Cancelled(_) => (
            499,
            "CANCELLED",
            true,
            None,
            false,
            LogLevel::Debug,
        ),
        SnapshotError::UnsupportedProvider(_) => (
            400,
            "UNSUPPORTED_PROVIDER",
            false,
            Some("Use one of: S3AWS, S3Compatible, Azure, Google"),
            false,
            LogLevel::Warn,
        ),
        SnapshotError::Api { .. } => (
            502,
            "API_ERROR",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        SnapshotError::UnexpectedStatus { .. } => (
            500,
            "UNEXPECTED_STATUS",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        SnapshotError::LocationSync { .. } => (
            500,
            "LOCATION_SYNC_FAILED",
            true,
            Some("Retry saving the snapshot store"),
            false,
            LogLevel::Error,
        ),
        SnapshotError::Transport(_) => (
            502,
            "TRANSPORT_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        SnapshotError::Serialization(_) => (
            500,
            "SERIALIZATION_ERROR",
            false,
            None,
            true,
            LogLevel::Error,
        ),
        SnapshotError::Decode(_) => (
            500,
            "DECODE_ERROR",
            false,
            None,
            true,
            LogLevel::Error,
        ),
        SnapshotError::Configuration(_) => (
            500,
            "CONFIGURATION_ERROR",
            false,
            Some("Check LIFEBOAT_* environment variables"),
            false,
            LogLevel::Error,
        ),
        SnapshotError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl SnapshotError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            SnapshotError::Validation(_) => "Validation",
            SnapshotError::PermissionDenied { .. } => "PermissionDenied",
            SnapshotError::NotFound(_) => "NotFound",
            SnapshotError::NotInstalled(_) => "NotInstalled",
            SnapshotError::PreconditionFailed(_) => "PreconditionFailed",
            SnapshotError::Conflict(_) => "Conflict",
            SnapshotError::Timeout { .. } => "Timeout",
            SnapshotError::Cancelled(_) => "Cancelled",
            SnapshotError::UnsupportedProvider(_) => "UnsupportedProvider",
            SnapshotError::Api { .. } => "Api",
            SnapshotError::UnexpectedStatus { .. } => "UnexpectedStatus",
            SnapshotError::LocationSync { .. } => "LocationSync",
            SnapshotError::Transport(_) => "Transport",
            SnapshotError::Serialization(_) => "Serialization",
            SnapshotError::Decode(_) => "Decode",
            SnapshotError::Configuration(_) => "Configuration",
            SnapshotError::Internal(_) => "Internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SnapshotError::Conflict(_))
    }
}

impl ErrorMetadata for SnapshotError {
    fn http_status_code(&self) -> u16 {
        snapshot_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        snapshot_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        snapshot_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        snapshot_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        snapshot_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        snapshot_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            SnapshotError::Validation(ref msg) => msg.clone(),
            SnapshotError::PermissionDenied { .. } => self.to_string(),
            SnapshotError::NotFound(ref msg) => msg.clone(),
            SnapshotError::NotInstalled(_) => {
                "The backup controller is not installed in this cluster".to_string()
            }
            SnapshotError::PreconditionFailed(ref msg) => msg.clone(),
            SnapshotError::Conflict(ref msg) => msg.clone(),
            SnapshotError::Timeout { .. } => self.to_string(),
            SnapshotError::Cancelled(ref msg) => msg.clone(),
            SnapshotError::UnsupportedProvider(ref provider) => {
                format!("Unsupported storage provider: {}", provider)
            }
            SnapshotError::Api { ref message, .. } => message.clone(),
            SnapshotError::UnexpectedStatus { .. } => {
                "Unexpected response from the cluster".to_string()
            }
            SnapshotError::LocationSync { .. } => self.to_string(),
            SnapshotError::Transport(_) => "Failed to reach the cluster".to_string(),
            SnapshotError::Serialization(_) => "Failed to encode or decode a resource".to_string(),
            SnapshotError::Decode(_) => "Failed to decode a downloaded artifact".to_string(),
            SnapshotError::Configuration(ref msg) => msg.clone(),
            SnapshotError::Internal(_) => "Internal error".to_string(),
        }
    }
}
