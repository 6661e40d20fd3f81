// ABOUTME: Bollard-based registry client for Docker and Podman.
// ABOUTME: Pulls through the engine API and classifies failures into PullError.

use crate::runtime::error::{ConnectionSnafu, RuntimeError};
use crate::runtime::traits::{PullError, RegistryClient};
use crate::runtime::types::{Endpoint, RuntimeInfo, RuntimeType};
use crate::types::ImageRef;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::CreateImageOptions;
use futures::StreamExt;
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use snafu::ResultExt;
use std::time::Duration;
use tokio::net::UnixStream;

/// Seconds bollard waits on a single engine request.
const CLIENT_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_pull_error(e: bollard::errors::Error, image_name: &str) -> PullError {
    use bollard::errors::Error;

    match &e {
        Error::DockerResponseServerError {
            status_code,
            message,
        } => PullError::from_status(*status_code, format!("{}: {}", image_name, message)),
        Error::DockerStreamError { error } => {
            PullError::from_message(format!("{}: {}", image_name, error))
        }
        Error::RequestTimeoutError => {
            PullError::Network(format!("{}: engine request timed out", image_name))
        }
        Error::IOError { .. } | Error::HyperResponseError { .. } => {
            PullError::Network(format!("{}: {}", image_name, e))
        }
        _ => PullError::Other(format!("{}: {}", image_name, e)),
    }
}

/// Find the first `"error"` entry in a libpod pull response.
///
/// The body is a sequence of concatenated JSON objects, one per progress
/// report.
fn libpod_stream_error(body: &[u8]) -> Option<String> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<serde_json::Value>()
        .filter_map(|value| value.ok())
        .find_map(|value| {
            value
                .get("error")
                .and_then(|e| e.as_str())
                .filter(|e| !e.is_empty())
                .map(str::to_string)
        })
}

// =============================================================================
// BollardRegistry
// =============================================================================

/// Registry client that pulls through a local container engine.
///
/// Supports both Docker and Podman via the Docker-compatible API. For Podman
/// reached over a socket, the native libpod endpoint is used instead.
pub struct BollardRegistry {
    client: Docker,
    runtime_type: RuntimeType,
    socket_path: Option<String>,
}

impl std::fmt::Debug for BollardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BollardRegistry")
            .field("runtime_type", &self.runtime_type)
            .field("socket_path", &self.socket_path)
            .finish()
    }
}

impl BollardRegistry {
    /// Create a new BollardRegistry from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
            socket_path: None,
        }
    }

    /// Create a new BollardRegistry with socket path for libpod API access.
    pub fn new_with_socket(client: Docker, runtime_type: RuntimeType, socket_path: String) -> Self {
        Self {
            client,
            runtime_type,
            socket_path: Some(socket_path),
        }
    }

    /// Connect to a runtime socket found by `detect_local()` or configured.
    pub fn connect(info: &RuntimeInfo) -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_unix(
            &info.socket_path,
            CLIENT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .context(ConnectionSnafu {
            endpoint: info.socket_path.clone(),
        })?;
        Ok(Self::new_with_socket(
            client,
            info.runtime_type,
            info.socket_path.clone(),
        ))
    }

    /// Connect using `DOCKER_HOST` and the other standard environment settings.
    pub fn connect_from_env() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_defaults().context(ConnectionSnafu {
            endpoint: std::env::var("DOCKER_HOST").unwrap_or_else(|_| "default".to_string()),
        })?;
        Ok(Self::new(client, RuntimeType::Docker))
    }

    pub fn connect_endpoint(endpoint: &Endpoint) -> Result<Self, RuntimeError> {
        match endpoint {
            Endpoint::Socket(info) => Self::connect(info),
            Endpoint::Environment => Self::connect_from_env(),
        }
    }

    /// Check that the engine answers before any pull is scheduled.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await.context(ConnectionSnafu {
            endpoint: self
                .socket_path
                .clone()
                .unwrap_or_else(|| "environment".to_string()),
        })?;
        Ok(())
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Pull through the Docker-compatible API, draining the progress stream.
    async fn pull_docker(&self, image_name: &str) -> Result<(), PullError> {
        let opts = CreateImageOptions {
            from_image: Some(image_name.to_string()),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_pull_error(e, image_name))?;
            if let Some(status) = info.status.as_deref() {
                tracing::trace!(image = image_name, layer = ?info.id, "{}", status);
            }
        }

        Ok(())
    }

    /// Pull using Podman's native libpod API with tlsVerify=false.
    /// This allows pulling from insecure (HTTP) registries.
    async fn pull_libpod(&self, socket_path: &str, image_name: &str) -> Result<(), PullError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            PullError::Network(format!("failed to connect to {}: {}", socket_path, e))
        })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| PullError::Network(format!("HTTP handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("libpod connection error: {}", e);
            }
        });

        let uri = format!(
            "/v4.0.0/libpod/images/pull?reference={}&tlsVerify=false",
            urlencoding::encode(image_name)
        );

        let req = hyper::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("Host", "localhost")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| PullError::Other(format!("failed to build request: {}", e)))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| PullError::Network(format!("request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| PullError::Network(format!("failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            let text = libpod_stream_error(&body)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());
            return Err(PullError::from_status(
                status.as_u16(),
                format!("{}: {}", image_name, text),
            ));
        }

        match libpod_stream_error(&body) {
            Some(error) => Err(PullError::from_message(format!("{}: {}", image_name, error))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryClient for BollardRegistry {
    async fn pull(&self, reference: &ImageRef, timeout: Duration) -> Result<(), PullError> {
        let image_name = reference.pull_reference();

        let pull = async {
            match (self.runtime_type, self.socket_path.as_deref()) {
                (RuntimeType::Podman, Some(socket)) => self.pull_libpod(socket, &image_name).await,
                _ => self.pull_docker(&image_name).await,
            }
        };

        tokio::time::timeout(timeout, pull)
            .await
            .unwrap_or(Err(PullError::Timeout(timeout)))
    }
}
