// ABOUTME: Retry policy for failed pull attempts.
// ABOUTME: Exponential backoff with jitter, bounded by attempt count and max delay.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

use crate::runtime::PullError;

/// Backoff and attempt limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total tries including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomizes each delay by up to ±this fraction.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.base_delay > self.max_delay {
            return Err(format!(
                "retry.base_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.base_delay, self.max_delay
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!(
                "retry.jitter must be between 0 and 1, got {}",
                self.jitter
            ));
        }
        Ok(())
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    GiveUp,
}

/// Decides whether and when a failed job runs again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide after `attempts` tries, the last of which failed with `error`.
    ///
    /// Only transient errors are retried; the decision never depends on
    /// earlier errors of the same job.
    pub fn decide(&self, attempts: u32, error: &PullError) -> RetryDecision {
        if !error.is_transient() || attempts >= self.config.max_attempts {
            return RetryDecision::GiveUp;
        }

        RetryDecision::Retry {
            after: self.jittered(self.backoff(attempts)),
        }
    }

    /// Un-jittered delay before the retry that follows attempt `attempts`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        if self.config.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.config.base_delay.as_secs_f64() * self.config.multiplier.powi(exponent);
        let capped = scaled.min(self.config.max_delay.as_secs_f64());
        self.clamped(capped)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let fraction = self.config.jitter;
        if fraction <= 0.0 || delay.is_zero() {
            return delay;
        }

        let factor = 1.0 + rand::thread_rng().gen_range(-fraction..=fraction);
        let secs = (delay.as_secs_f64() * factor).clamp(0.0, self.config.max_delay.as_secs_f64());
        self.clamped(secs)
    }

    /// Seconds to a `Duration` no longer than `max_delay`, even past `Duration::MAX`.
    fn clamped(&self, secs: f64) -> Duration {
        let max = self.config.max_delay;
        Duration::try_from_secs_f64(secs).map_or(max, |d| d.min(max))
    }
}
