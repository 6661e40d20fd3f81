// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use pulley::config::PullConfig;
use pulley::output::OutputMode;
use pulley::runtime::{RuntimeConfig, RuntimeType};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pulley")]
#[command(about = "Pull container images concurrently, with retries, for Docker and Podman")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new pulley.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Pull images from their registries
    Pull(PullArgs),
}

#[derive(Args)]
pub struct PullArgs {
    /// Image references to pull (e.g. redis:latest)
    pub images: Vec<String>,

    /// Read image references from a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Configuration file (default: discover pulley.yml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent pulls
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Total tries per image, including the first
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Time limit for a single pull attempt (e.g. 90s, 5m)
    #[arg(long, value_parser = parse_duration)]
    pub attempt_timeout: Option<Duration>,

    /// Time limit for the whole run
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Container runtime to use (default: auto-detect)
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeType>,

    /// Runtime socket path
    #[arg(long)]
    pub socket: Option<String>,

    /// Only print the final result
    #[arg(short, long, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long)]
    pub json: bool,
}

impl PullArgs {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    /// Apply command-line overrides on top of file settings.
    pub fn pull_config(&self, mut config: PullConfig) -> PullConfig {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(attempt_timeout) = self.attempt_timeout {
            config.attempt_timeout = attempt_timeout;
        }
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        config
    }

    pub fn runtime_config(&self, config: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime.or(config.runtime),
            socket: self.socket.clone().or(config.socket),
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}
