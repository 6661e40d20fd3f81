// ABOUTME: Runtime detection logic for the local system.
// ABOUTME: Checks for Podman sockets first, then Docker; explicit config wins.

use super::types::{Endpoint, RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect container runtime on the local system.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<RuntimeInfo, DetectionError> {
    let rootless = get_uid().map(|uid| format!("/run/user/{}/podman/podman.sock", uid));
    let candidates = rootless
        .iter()
        .map(|s| (RuntimeType::Podman, s.as_str()))
        .chain([
            (RuntimeType::Podman, ROOTFUL_PODMAN),
            (RuntimeType::Docker, DOCKER_SOCKET),
        ]);

    first_existing(candidates).ok_or(DetectionError::NoRuntimeFound)
}

fn first_existing<'a>(
    candidates: impl IntoIterator<Item = (RuntimeType, &'a str)>,
) -> Option<RuntimeInfo> {
    candidates
        .into_iter()
        .find(|(_, path)| Path::new(path).exists())
        .map(|(runtime_type, path)| RuntimeInfo {
            runtime_type,
            socket_path: path.to_string(),
        })
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        // Fall back to reading /proc/self/status
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

/// Decide how to reach the engine.
///
/// Explicit `runtime`/`socket` settings take precedence. Without them a set
/// `docker_host` (the value of `DOCKER_HOST`) selects the environment
/// defaults, and otherwise the local sockets are probed.
pub fn resolve_endpoint(
    config: &RuntimeConfig,
    docker_host: Option<&str>,
) -> Result<Endpoint, DetectionError> {
    match (config.runtime, config.socket.as_deref()) {
        (Some(runtime_type), socket) => Ok(Endpoint::Socket(RuntimeInfo {
            runtime_type,
            socket_path: socket
                .map(str::to_string)
                .unwrap_or_else(|| default_socket_path(runtime_type)),
        })),
        (None, Some(socket)) => Ok(Endpoint::Socket(RuntimeInfo {
            runtime_type: guess_runtime(socket),
            socket_path: socket.to_string(),
        })),
        (None, None) if docker_host.is_some_and(|h| !h.trim().is_empty()) => {
            Ok(Endpoint::Environment)
        }
        (None, None) => detect_local().map(Endpoint::Socket),
    }
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}

fn guess_runtime(socket: &str) -> RuntimeType {
    if socket.contains("podman") {
        RuntimeType::Podman
    } else {
        RuntimeType::Docker
    }
}
