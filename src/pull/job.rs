// ABOUTME: Pull job lifecycle state machine.
// ABOUTME: Validates transitions and produces progress events and final results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::runtime::PullError;
use crate::types::ImageRef;

/// Lifecycle state of a pull job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Abandoned,
}

impl JobState {
    /// Succeeded, Failed and Abandoned are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Abandoned
        )
    }

    /// Whether `self -> next` is a permitted transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Abandoned)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Retrying)
                | (Running, Abandoned)
                | (Retrying, Running)
                | (Retrying, Abandoned)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Retrying => "retrying",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Abandoned => "abandoned",
        };
        write!(f, "{s}")
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition for {reference}: {from} -> {to}")]
pub struct InvalidTransition {
    pub reference: ImageRef,
    pub from: JobState,
    pub to: JobState,
}

/// A single state change, as observed by the progress aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub reference: ImageRef,
    pub from: JobState,
    pub to: JobState,
    /// Attempts made so far, including the one this event starts.
    pub attempts: u32,
    pub error: Option<PullError>,
    pub at: DateTime<Utc>,
}

/// One image reference's pull lifecycle.
#[derive(Debug, Clone)]
pub struct PullJob {
    reference: ImageRef,
    state: JobState,
    attempts: u32,
    last_error: Option<PullError>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl PullJob {
    pub fn new(reference: ImageRef) -> Self {
        Self {
            reference,
            state: JobState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&PullError> {
        self.last_error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Move to `next`, recording `error` as the cause when given.
    ///
    /// Entering Running counts a new attempt. Entering a terminal state stamps
    /// the finish time.
    pub fn transition(
        &mut self,
        next: JobState,
        error: Option<PullError>,
    ) -> Result<ProgressEvent, InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                reference: self.reference.clone(),
                from: self.state,
                to: next,
            });
        }

        let now = Utc::now();
        let from = self.state;

        if next == JobState::Running {
            self.attempts += 1;
            self.started_at.get_or_insert(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        if error.is_some() {
            self.last_error = error.clone();
        }
        self.state = next;

        Ok(ProgressEvent {
            reference: self.reference.clone(),
            from,
            to: next,
            attempts: self.attempts,
            error,
            at: now,
        })
    }

    /// Final outcome. Returns `None` until the job is terminal.
    pub fn result(&self) -> Option<PullResult> {
        if !self.state.is_terminal() {
            return None;
        }

        let total_duration = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        };

        Some(PullResult {
            reference: self.reference.clone(),
            state: self.state,
            succeeded: self.state == JobState::Succeeded,
            attempts: self.attempts,
            total_duration,
            final_error: if self.state == JobState::Succeeded {
                None
            } else {
                self.last_error.clone()
            },
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

/// Terminal outcome of one job, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub reference: ImageRef,
    pub state: JobState,
    pub succeeded: bool,
    pub attempts: u32,
    pub total_duration: Duration,
    pub final_error: Option<PullError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
