// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Detection, connection, and the bollard-backed registry client.

mod bollard;
mod detection;
mod error;
pub mod traits;
mod types;

pub use self::bollard::BollardRegistry;
pub use detection::{DetectionError, detect_local, resolve_endpoint};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::{ErrorKind, PullError, RegistryClient};
pub use types::{Endpoint, RuntimeConfig, RuntimeInfo, RuntimeType};
