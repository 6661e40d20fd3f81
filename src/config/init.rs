// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates pulley.yml template files.

use std::path::Path;

use super::{CONFIG_FILENAME, Config};
use crate::error::{Error, Result};

/// Write a template `pulley.yml` into `dir`.
pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, generate_template_yaml(&Config::template()))?;
    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let images: String = config
        .images
        .iter()
        .map(|image| format!("  - {}\n", image))
        .collect();
    let retry = &config.pull.retry;

    format!(
        r#"images:
{images}
concurrency: {concurrency}
attempt_timeout: {attempt_timeout}s
cancel_grace: {cancel_grace}s

retry:
  max_attempts: {max_attempts}
  base_delay: {base_delay}ms
  max_delay: {max_delay}s
  multiplier: {multiplier:?}
  jitter: {jitter:?}
"#,
        concurrency = config.pull.concurrency,
        attempt_timeout = config.pull.attempt_timeout.as_secs(),
        cancel_grace = config.pull.cancel_grace.as_secs(),
        max_attempts = retry.max_attempts,
        base_delay = retry.base_delay.as_millis(),
        max_delay = retry.max_delay.as_secs(),
        multiplier = retry.multiplier,
        jitter = retry.jitter,
    )
}
