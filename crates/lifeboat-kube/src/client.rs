//! Namespaced REST client for the cluster API server.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lifeboat_core::constants::VELERO_API_VERSION;
use lifeboat_core::{Config, SnapshotError, SnapshotResult};
use reqwest::{Client, Method};
use serde_json::Value;

/// Status and decoded body of a response, before status mapping.
///
/// Non-JSON bodies are kept as a JSON string and empty bodies as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

/// Authenticated JSON access to one API group in one namespace.
///
/// Paths are relative to the namespace, e.g. `backups/nightly-1` or
/// `podvolumebackups?labelSelector=...`.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    fn namespace(&self) -> &str;

    /// Perform the call and return whatever the server answered.
    async fn unhandled_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SnapshotResult<RawResponse>;

    /// Perform the call and map the status onto the snapshot error taxonomy
    /// (see [`map_response`]).
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SnapshotResult<Value> {
        let response = self.unhandled_request(method.clone(), path, body).await?;
        map_response(&method, path, self.namespace(), response)
    }
}

/// Map an HTTP response onto a body or a [`SnapshotError`].
///
/// 2xx returns the body (`null` for 204). 400 and 422 are validation-style
/// answers: logged as warnings and returned to the caller. 403, 404 and 409
/// map to `PermissionDenied`, `NotFound` and `Conflict`. Any other status
/// becomes `Api` when the body carries a `message`, else `UnexpectedStatus`.
pub fn map_response(
    method: &Method,
    path: &str,
    namespace: &str,
    response: RawResponse,
) -> SnapshotResult<Value> {
    let RawResponse { status, body } = response;

    match status {
        204 => Ok(Value::Null),
        200..=299 => Ok(body),
        400 | 422 => {
            tracing::warn!(
                method = %method,
                path = %path,
                status = status,
                body = %body,
                "Resource request rejected by API server"
            );
            Ok(body)
        }
        403 => Err(SnapshotError::PermissionDenied {
            method: method.to_string(),
            path: path.to_string(),
            namespace: namespace.to_string(),
        }),
        404 => Err(SnapshotError::NotFound(path.to_string())),
        409 => Err(SnapshotError::Conflict(
            body_message(&body).unwrap_or_else(|| format!("{} was modified concurrently", path)),
        )),
        _ => match body_message(&body) {
            Some(message) => Err(SnapshotError::Api { status, message }),
            None => {
                tracing::error!(
                    method = %method,
                    path = %path,
                    status = status,
                    body = %body,
                    "Unexpected response from API server"
                );
                Err(SnapshotError::UnexpectedStatus {
                    status,
                    body: body.to_string(),
                })
            }
        },
    }
}

fn body_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Shared HTTP client and credentials for one API server.
#[derive(Clone, Debug)]
pub struct ClusterConnection {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ClusterConnection {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> SnapshotResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                SnapshotError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a connection from configuration: explicit token or the mounted
    /// service-account token, plus the cluster CA bundle when present.
    pub fn from_config(config: &Config) -> SnapshotResult<Self> {
        let mut builder = Client::builder().timeout(config.http_timeout());

        if let Some(ca_path) = config.kube_ca_cert_path.as_deref() {
            if Path::new(ca_path).exists() {
                let pem = std::fs::read(ca_path).map_err(|e| {
                    SnapshotError::Configuration(format!(
                        "Failed to read CA bundle {}: {}",
                        ca_path, e
                    ))
                })?;
                let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    SnapshotError::Configuration(format!("Invalid CA bundle {}: {}", ca_path, e))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        if config.kube_insecure_skip_tls_verify {
            tracing::warn!("TLS verification of the API server is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            SnapshotError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        let token = match &config.kube_token {
            Some(token) => Some(token.clone()),
            None => read_token_file(config.kube_token_path.as_deref())?,
        };

        Ok(Self::with_client(client, &config.kube_api_url, token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn read_token_file(path: Option<&str>) -> SnapshotResult<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let token = std::fs::read_to_string(path).map_err(|e| {
        SnapshotError::Configuration(format!("Failed to read token file {}: {}", path, e))
    })?;
    let token = token.trim().to_string();
    Ok((!token.is_empty()).then_some(token))
}

/// [`ResourceApi`] over HTTP for either the backup controller's API group or
/// the core `v1` group.
#[derive(Clone, Debug)]
pub struct ResourceClient {
    connection: ClusterConnection,
    api_prefix: String,
    namespace: String,
}

impl ResourceClient {
    /// Custom resources of the backup controller (`velero.io/v1`).
    pub fn velero(connection: ClusterConnection, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            connection,
            api_prefix: format!("/apis/{}/namespaces/{}", VELERO_API_VERSION, namespace),
            namespace,
        }
    }

    /// Core resources (`v1`), used for credential secrets.
    pub fn core(connection: ClusterConnection, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            connection,
            api_prefix: format!("/api/v1/namespaces/{}", namespace),
            namespace,
        }
    }

    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.connection.base_url,
            self.api_prefix,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ResourceApi for ResourceClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn unhandled_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SnapshotResult<RawResponse> {
        let url = self.build_url(path);
        let mut request = self
            .connection
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.connection.apply_auth(request);

        tracing::debug!(method = %method, url = %url, "Sending resource request");

        let response = request.send().await.map_err(|e| {
            SnapshotError::Transport(format!("{} {} failed: {}", method, path, e))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            SnapshotError::Transport(format!("Failed to read response body: {}", e))
        })?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(RawResponse { status, body })
    }
}
