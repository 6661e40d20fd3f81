// ABOUTME: Library root for pulley - exposes the pull orchestration core.
// ABOUTME: The command-line binary is in main.rs.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod pull;
pub mod runtime;
pub mod types;

pub use orchestrator::{Orchestrator, parse_references};
