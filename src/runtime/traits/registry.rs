// ABOUTME: Registry client trait consumed by the pull workers.
// ABOUTME: Pull failures are classified here so retry decisions stay pure.

use crate::types::ImageRef;
use async_trait::async_trait;
use std::time::Duration;

/// Pulls a single image through the container runtime.
///
/// Implementations must classify every failure into a [`PullError`] variant;
/// opaque failures belong in [`PullError::Other`].
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Pull an image, giving up after `timeout`.
    async fn pull(&self, reference: &ImageRef, timeout: Duration) -> Result<(), PullError>;
}

/// Errors from a single pull attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PullError {
    #[error("pull timed out after {0:?}")]
    Timeout(Duration),

    #[error("registry server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited by registry: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("malformed image reference: {0}")]
    MalformedReference(String),

    #[error("pull cancelled")]
    Cancelled,

    #[error("pull failed: {0}")]
    Other(String),
}

/// Retry classification of a [`PullError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Expected to resolve without intervention.
    Transient,
    /// Will not resolve on retry.
    Permanent,
    /// Unclassified; never retried.
    Unknown,
}

impl PullError {
    /// Returns the error kind for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PullError::Timeout(_)
            | PullError::Server { .. }
            | PullError::RateLimited(_)
            | PullError::Network(_) => ErrorKind::Transient,
            PullError::NotFound(_)
            | PullError::Unauthorized(_)
            | PullError::MalformedReference(_)
            | PullError::Cancelled => ErrorKind::Permanent,
            PullError::Other(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Classify an HTTP status returned by the engine or registry.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => PullError::MalformedReference(message),
            401 | 403 => PullError::Unauthorized(message),
            404 => PullError::NotFound(message),
            408 => PullError::Network(message),
            429 => PullError::RateLimited(message),
            500..=599 => PullError::Server { status, message },
            _ => PullError::Other(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Classify an error message reported inside a pull progress stream.
    ///
    /// Engines report registry failures as free text once the stream has
    /// started, so this matches the phrases Docker and Podman emit.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if lower.contains("toomanyrequests") || lower.contains("rate limit") {
            PullError::RateLimited(message)
        } else if lower.contains("invalid reference format")
            || lower.contains("repository name must")
        {
            PullError::MalformedReference(message)
        } else if lower.contains("unauthorized")
            || lower.contains("authentication required")
            || lower.contains("access denied")
            || lower.contains("denied:")
        {
            PullError::Unauthorized(message)
        } else if lower.contains("manifest unknown")
            || lower.contains("not found")
            || lower.contains("does not exist")
        {
            PullError::NotFound(message)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            PullError::Network(message)
        } else if lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("unexpected eof")
            || lower.contains("tls handshake")
        {
            PullError::Network(message)
        } else if lower.contains("internal server error")
            || lower.contains("bad gateway")
            || lower.contains("service unavailable")
        {
            PullError::Server {
                status: 500,
                message,
            }
        } else {
            PullError::Other(message)
        }
    }
}
