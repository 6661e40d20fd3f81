// ABOUTME: Configuration types and parsing for pulley.yml.
// ABOUTME: Handles YAML parsing, discovery, validation, and image list files.

mod image_list;
mod init;

pub use image_list::read_image_list;
pub use init::init_config;

use crate::error::{Error, Result, SetupError};
use crate::pull::RetryConfig;
use crate::runtime::RuntimeConfig;
use crate::types::ImageRef;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "pulley.yml";
pub const CONFIG_FILENAME_ALT: &str = "pulley.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".pulley/config.yml";

/// Contents of a `pulley.yml` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub images: Vec<ImageRef>,

    #[serde(flatten)]
    pub pull: PullConfig,

    #[serde(flatten)]
    pub runtime: RuntimeConfig,
}

/// Knobs for one orchestration run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullConfig {
    /// Maximum pulls in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Bound on a single attempt's registry call.
    #[serde(default = "default_attempt_timeout", with = "humantime_serde")]
    pub attempt_timeout: Duration,

    /// Bound on the whole run; jobs still unfinished are abandoned.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// How long an in-flight pull may continue after cancellation.
    #[serde(default = "default_cancel_grace", with = "humantime_serde")]
    pub cancel_grace: Duration,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_concurrency() -> usize {
    4
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(10)
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            attempt_timeout: default_attempt_timeout(),
            timeout: None,
            cancel_grace: default_cancel_grace(),
            retry: RetryConfig::default(),
        }
    }
}

impl PullConfig {
    pub fn validate(&self) -> std::result::Result<(), SetupError> {
        if self.concurrency == 0 {
            return Err(SetupError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(SetupError::InvalidConfig(
                "attempt_timeout must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SetupError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.retry.validate().map_err(SetupError::InvalidConfig)
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn template() -> Self {
        Config {
            images: ["redis:latest", "nginx:latest"]
                .iter()
                .filter_map(|s| ImageRef::parse(s).ok())
                .collect(),
            pull: PullConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}
