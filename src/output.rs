// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::progress::PullSummary;
use crate::pull::{JobState, ProgressEvent, PullResult};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Report one job transition.
    pub fn event(&self, event: &ProgressEvent) {
        match self.mode {
            OutputMode::Normal => {
                if let Some(line) = describe(event) {
                    println!("{line}");
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let error = event.error.as_ref().map(|e| e.to_string());
                print_json(&TransitionEvent {
                    event: "transition",
                    image: event.reference.as_str(),
                    from: event.from,
                    to: event.to,
                    attempts: event.attempts,
                    error: error.as_deref(),
                });
            }
        }
    }

    /// Print the final summary of a run, one line per requested image.
    pub fn summary(&self, summary: &PullSummary) {
        match self.mode {
            OutputMode::Normal => {
                println!("{}", summary_text(summary));
                println!("Finished in {:.1}s", self.elapsed_secs());
            }
            OutputMode::Quiet => println!("{}", summary_text(summary)),
            OutputMode::Json => {
                for result in &summary.results {
                    let error = result.final_error.as_ref().map(|e| e.to_string());
                    print_json(&ResultEvent {
                        event: "result",
                        image: result.reference.as_str(),
                        state: result.state,
                        succeeded: result.succeeded,
                        attempts: result.attempts,
                        duration_secs: result.total_duration.as_secs_f64(),
                        error: error.as_deref(),
                    });
                }
                print_json(&SummaryEvent {
                    event: "summary",
                    succeeded: summary.succeeded,
                    failed: summary.failed,
                    abandoned: summary.abandoned,
                    duration_secs: self.elapsed_secs(),
                });
            }
        }
    }
}

/// Human-readable line for a transition, or `None` when it is not worth showing.
fn describe(event: &ProgressEvent) -> Option<String> {
    let image = &event.reference;
    let error = event
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_default();

    match (event.from, event.to) {
        (JobState::Pending, JobState::Running) => Some(format!("Pulling image {image}")),
        (JobState::Retrying, JobState::Running) => Some(format!(
            "Pulling image {image} (attempt {})",
            event.attempts
        )),
        (_, JobState::Retrying) => Some(format!("  ! {image}: {error}")),
        (_, JobState::Succeeded) => Some(format!("  ✓ {image}")),
        (_, JobState::Failed) => Some(format!("  ✗ {image}: {error}")),
        (_, JobState::Abandoned) => Some(format!("  ✗ {image} abandoned: {error}")),
        _ => None,
    }
}

/// Outcome line for one result.
fn describe_result(result: &PullResult) -> String {
    match (&result.final_error, result.succeeded) {
        (_, true) => format!(
            "  ✓ {} (attempts {})",
            result.reference, result.attempts
        ),
        (Some(e), false) => format!(
            "  ✗ {} {} after {} attempt(s): {}",
            result.reference, result.state, result.attempts, e
        ),
        (None, false) => format!("  ✗ {} {}", result.reference, result.state),
    }
}

/// Every result in order, then the totals.
fn summary_text(summary: &PullSummary) -> String {
    let mut lines: Vec<String> = summary.results.iter().map(describe_result).collect();
    lines.push(format!(
        "Pulled {}/{} images ({} failed, {} abandoned)",
        summary.succeeded,
        summary.results.len(),
        summary.failed,
        summary.abandoned
    ));
    lines.join("\n")
}

fn print_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct TransitionEvent<'a> {
    event: &'a str,
    image: &'a str,
    from: JobState,
    to: JobState,
    attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct ResultEvent<'a> {
    event: &'a str,
    image: &'a str,
    state: JobState,
    succeeded: bool,
    attempts: u32,
    duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct SummaryEvent<'a> {
    event: &'a str,
    succeeded: usize,
    failed: usize,
    abandoned: usize,
    duration_secs: f64,
}
