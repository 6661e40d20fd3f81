// ABOUTME: Progress aggregation for concurrent pull jobs.
// ABOUTME: Serializes state updates and hands out point-in-time snapshots.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::pull::{JobState, ProgressEvent, PullResult};
use crate::runtime::PullError;
use crate::types::ImageRef;

const EVENT_CAPACITY: usize = 256;

/// Current view of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<PullError>,
    pub updated_at: DateTime<Utc>,
}

/// Counts of jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub running: usize,
    pub retrying: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub abandoned: usize,
}

impl StateCounts {
    fn add(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Retrying => self.retrying += 1,
            JobState::Succeeded => self.succeeded += 1,
            JobState::Failed => self.failed += 1,
            JobState::Abandoned => self.abandoned += 1,
        }
    }

    pub fn get(&self, state: JobState) -> usize {
        match state {
            JobState::Pending => self.pending,
            JobState::Running => self.running,
            JobState::Retrying => self.retrying,
            JobState::Succeeded => self.succeeded,
            JobState::Failed => self.failed,
            JobState::Abandoned => self.abandoned,
        }
    }

    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed + self.abandoned
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.retrying + self.terminal()
    }
}

/// Owned copy of every job's status, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub entries: Vec<(ImageRef, JobStatus)>,
    pub counts: StateCounts,
}

impl ProgressSnapshot {
    pub fn get(&self, reference: &ImageRef) -> Option<&JobStatus> {
        self.entries
            .iter()
            .find(|(r, _)| r == reference)
            .map(|(_, status)| status)
    }

    /// True when every registered job is terminal.
    pub fn is_complete(&self) -> bool {
        !self.entries.is_empty() && self.counts.terminal() == self.counts.total()
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub results: Vec<PullResult>,
}

impl PullSummary {
    pub fn from_results(results: Vec<PullResult>) -> Self {
        let mut counts = StateCounts::default();
        for result in &results {
            counts.add(result.state);
        }
        Self {
            succeeded: counts.succeeded,
            failed: counts.failed,
            abandoned: counts.abandoned,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.abandoned == 0
    }
}

#[derive(Default)]
struct Inner {
    order: Vec<ImageRef>,
    jobs: HashMap<ImageRef, JobStatus>,
    results: Option<Vec<PullResult>>,
}

/// Collects progress events from all workers.
///
/// Every mutation happens under one lock acquisition, so a snapshot never
/// contains half of a transition.
pub struct ProgressAggregator {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    /// Forget every job and the last summary before a new run.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.jobs.clear();
        inner.results = None;
    }

    /// Track a job in Pending state. Registering twice is a no-op.
    pub fn register(&self, reference: &ImageRef) {
        let mut inner = self.inner.lock();
        if inner.jobs.contains_key(reference) {
            return;
        }
        inner.order.push(reference.clone());
        inner.jobs.insert(
            reference.clone(),
            JobStatus {
                state: JobState::Pending,
                attempts: 0,
                last_error: None,
                updated_at: Utc::now(),
            },
        );
    }

    /// Apply one transition and forward it to subscribers.
    pub fn apply(&self, event: ProgressEvent) {
        let mut inner = self.inner.lock();

        if !inner.jobs.contains_key(&event.reference) {
            inner.order.push(event.reference.clone());
        }

        let status = inner
            .jobs
            .entry(event.reference.clone())
            .or_insert_with(|| JobStatus {
                state: event.from,
                attempts: 0,
                last_error: None,
                updated_at: event.at,
            });

        if status.state != event.from {
            tracing::warn!(
                image = %event.reference,
                expected = %status.state,
                got = %event.from,
                "out-of-order progress event"
            );
        }

        status.state = event.to;
        status.attempts = event.attempts;
        status.updated_at = event.at;
        if event.error.is_some() {
            status.last_error = event.error.clone();
        }

        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Receive every event applied after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        let mut counts = StateCounts::default();
        let entries = inner
            .order
            .iter()
            .filter_map(|r| inner.jobs.get(r).map(|s| (r.clone(), s.clone())))
            .inspect(|(_, status)| counts.add(status.state))
            .collect();
        ProgressSnapshot { entries, counts }
    }

    /// Record the final results once every job is terminal.
    pub fn complete(&self, results: Vec<PullResult>) {
        self.inner.lock().results = Some(results);
    }

    /// Final summary, available after [`complete`](Self::complete).
    pub fn summary(&self) -> Option<PullSummary> {
        self.inner
            .lock()
            .results
            .clone()
            .map(PullSummary::from_results)
    }
}
