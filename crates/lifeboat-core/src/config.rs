//! Configuration module
//!
//! Settings for reaching the cluster API server, locating the backup controller
//! and tuning the download-request polling policy. Values are read from the
//! environment (after loading an optional `.env` file).

use std::env;
use std::time::Duration;

use crate::error::{SnapshotError, SnapshotResult};

const DEFAULT_VELERO_NAMESPACE: &str = "velero";
const DEFAULT_GLOBAL_LOCATION_NAME: &str = "default";
const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_CA_CERT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const HTTP_TIMEOUT_SECS: u64 = 60;
const DOWNLOAD_MAX_ATTEMPTS: u32 = 30;
const DOWNLOAD_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_SNAPSHOT_TTL: &str = "720h";

/// Bounded retry policy for download-request polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DOWNLOAD_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(DOWNLOAD_POLL_INTERVAL_MS),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the Kubernetes API server.
    pub kube_api_url: String,
    /// Bearer token; takes precedence over `kube_token_path`.
    pub kube_token: Option<String>,
    pub kube_token_path: Option<String>,
    pub kube_ca_cert_path: Option<String>,
    pub kube_insecure_skip_tls_verify: bool,
    /// Namespace the backup controller and its credential secrets live in.
    pub velero_namespace: String,
    pub global_location_name: String,
    pub http_timeout_seconds: u64,
    pub download: DownloadPolicy,
    /// TTL applied to backups of applications without their own setting.
    pub default_snapshot_ttl: String,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kube_api_url: "https://kubernetes.default.svc".to_string(),
            kube_token: None,
            kube_token_path: Some(DEFAULT_TOKEN_PATH.to_string()),
            kube_ca_cert_path: Some(DEFAULT_CA_CERT_PATH.to_string()),
            kube_insecure_skip_tls_verify: false,
            velero_namespace: DEFAULT_VELERO_NAMESPACE.to_string(),
            global_location_name: DEFAULT_GLOBAL_LOCATION_NAME.to_string(),
            http_timeout_seconds: HTTP_TIMEOUT_SECS,
            download: DownloadPolicy::default(),
            default_snapshot_ttl: DEFAULT_SNAPSHOT_TTL.to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> SnapshotResult<Self> {
        dotenvy::dotenv().ok();

        let kube_api_url = match env::var("LIFEBOAT_KUBE_API_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    SnapshotError::Configuration(
                        "LIFEBOAT_KUBE_API_URL or KUBERNETES_SERVICE_HOST must be set".to_string(),
                    )
                })?;
                let port =
                    env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{}:{}", host, port)
            }
        };

        let config = Config {
            kube_api_url: kube_api_url.trim_end_matches('/').to_string(),
            kube_token: env::var("LIFEBOAT_KUBE_TOKEN").ok().filter(|s| !s.is_empty()),
            kube_token_path: Some(
                env::var("LIFEBOAT_KUBE_TOKEN_PATH")
                    .unwrap_or_else(|_| DEFAULT_TOKEN_PATH.to_string()),
            ),
            kube_ca_cert_path: env::var("LIFEBOAT_KUBE_CA_CERT_PATH")
                .ok()
                .or_else(|| Some(DEFAULT_CA_CERT_PATH.to_string()))
                .filter(|s| !s.is_empty()),
            kube_insecure_skip_tls_verify: env::var("LIFEBOAT_KUBE_INSECURE_SKIP_TLS_VERIFY")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            velero_namespace: env::var("LIFEBOAT_VELERO_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_VELERO_NAMESPACE.to_string()),
            global_location_name: env::var("LIFEBOAT_GLOBAL_LOCATION_NAME")
                .unwrap_or_else(|_| DEFAULT_GLOBAL_LOCATION_NAME.to_string()),
            http_timeout_seconds: env::var("LIFEBOAT_HTTP_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            download: DownloadPolicy {
                max_attempts: env::var("LIFEBOAT_DOWNLOAD_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| DOWNLOAD_MAX_ATTEMPTS.to_string())
                    .parse()
                    .unwrap_or(DOWNLOAD_MAX_ATTEMPTS),
                poll_interval: Duration::from_millis(
                    env::var("LIFEBOAT_DOWNLOAD_POLL_INTERVAL_MS")
                        .unwrap_or_else(|_| DOWNLOAD_POLL_INTERVAL_MS.to_string())
                        .parse()
                        .unwrap_or(DOWNLOAD_POLL_INTERVAL_MS),
                ),
            },
            default_snapshot_ttl: env::var("LIFEBOAT_DEFAULT_SNAPSHOT_TTL")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_TTL.to_string()),
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SnapshotResult<()> {
        if !self.kube_api_url.starts_with("https://") && !self.kube_api_url.starts_with("http://")
        {
            return Err(SnapshotError::Configuration(
                "LIFEBOAT_KUBE_API_URL must be an http(s) URL".to_string(),
            ));
        }

        if self.velero_namespace.is_empty() {
            return Err(SnapshotError::Configuration(
                "LIFEBOAT_VELERO_NAMESPACE must not be empty".to_string(),
            ));
        }

        if self.global_location_name.is_empty() {
            return Err(SnapshotError::Configuration(
                "LIFEBOAT_GLOBAL_LOCATION_NAME must not be empty".to_string(),
            ));
        }

        if self.download.max_attempts == 0 {
            return Err(SnapshotError::Configuration(
                "LIFEBOAT_DOWNLOAD_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_policy_defaults() {
        let policy = DownloadPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.velero_namespace, "velero");
        assert_eq!(config.global_location_name, "default");
        assert!(!config.is_production());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.download.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(SnapshotError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = Config {
            kube_api_url: "kubernetes.default.svc".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
