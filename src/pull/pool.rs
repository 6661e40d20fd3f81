// ABOUTME: Bounded-concurrency worker pool that drives pull jobs to completion.
// ABOUTME: Applies per-attempt timeouts, retry backoff, and cooperative cancellation.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::config::PullConfig;
use crate::progress::ProgressAggregator;
use crate::runtime::{PullError, RegistryClient};
use crate::types::ImageRef;

use super::cancel::CancelSignal;
use super::job::{JobState, ProgressEvent, PullJob, PullResult};
use super::retry::{RetryDecision, RetryPolicy};

/// Runs pull jobs with at most `concurrency` in Running at once.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    attempt_timeout: Duration,
    cancel_grace: Duration,
    policy: RetryPolicy,
}

impl WorkerPool {
    pub fn new(
        concurrency: usize,
        attempt_timeout: Duration,
        cancel_grace: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            concurrency: concurrency.max(1),
            attempt_timeout,
            cancel_grace,
            policy,
        }
    }

    pub fn from_config(config: &PullConfig) -> Self {
        Self::new(
            config.concurrency,
            config.attempt_timeout,
            config.cancel_grace,
            RetryPolicy::new(config.retry.clone()),
        )
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drive every job to a terminal state.
    ///
    /// Results come back in the order the jobs were given, whatever order
    /// they finish in.
    pub async fn run(
        &self,
        jobs: Vec<PullJob>,
        client: Arc<dyn RegistryClient>,
        progress: Arc<ProgressAggregator>,
        cancel: CancelSignal,
    ) -> Vec<PullResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let references: Vec<ImageRef> = jobs.iter().map(|j| j.reference().clone()).collect();
        let mut tasks = JoinSet::new();

        for job in &jobs {
            progress.register(job.reference());
        }

        for (index, job) in jobs.into_iter().enumerate() {
            let worker = Worker {
                client: client.clone(),
                progress: progress.clone(),
                semaphore: semaphore.clone(),
                cancel: cancel.clone(),
                policy: self.policy.clone(),
                attempt_timeout: self.attempt_timeout,
                cancel_grace: self.cancel_grace,
            };
            tasks.spawn(async move { (index, worker.drive(job).await) });
        }

        let mut slots: Vec<Option<PullResult>> = vec![None; references.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, job)) => slots[index] = job.result(),
                Err(e) => tracing::error!("pull worker task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(references)
            .map(|(slot, reference)| {
                slot.unwrap_or_else(|| lost_job(&progress, reference))
            })
            .collect()
    }
}

/// Report a job whose worker died as Abandoned rather than dropping it.
fn lost_job(progress: &ProgressAggregator, reference: ImageRef) -> PullResult {
    let error = PullError::Other("pull worker terminated unexpectedly".to_string());
    let (from, attempts) = progress
        .snapshot()
        .get(&reference)
        .map(|status| (status.state, status.attempts))
        .unwrap_or((JobState::Pending, 0));
    let now = Utc::now();

    if !from.is_terminal() {
        progress.apply(ProgressEvent {
            reference: reference.clone(),
            from,
            to: JobState::Abandoned,
            attempts,
            error: Some(error.clone()),
            at: now,
        });
    }

    PullResult {
        reference,
        state: JobState::Abandoned,
        succeeded: false,
        attempts,
        total_duration: Duration::ZERO,
        final_error: Some(error),
        started_at: None,
        finished_at: Some(now),
    }
}

enum Attempt {
    Finished(Result<(), PullError>),
    /// Cancel fired mid-call; `None` when the grace period ran out too.
    Cancelled(Option<Result<(), PullError>>),
}

struct Worker {
    client: Arc<dyn RegistryClient>,
    progress: Arc<ProgressAggregator>,
    semaphore: Arc<Semaphore>,
    cancel: CancelSignal,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    cancel_grace: Duration,
}

impl Worker {
    async fn drive(self, mut job: PullJob) -> PullJob {
        loop {
            let Some(permit) = self.acquire_slot().await else {
                self.advance(&mut job, JobState::Abandoned, Some(PullError::Cancelled));
                return job;
            };

            self.advance(&mut job, JobState::Running, None);
            if job.attempts() == 1 {
                tracing::info!(image = %job.reference(), "Pulling image {}", job.reference());
            } else {
                tracing::info!(
                    image = %job.reference(),
                    attempt = job.attempts(),
                    "retrying pull"
                );
            }

            let outcome = self.attempt(job.reference()).await;
            match outcome {
                Attempt::Finished(Ok(())) => {
                    self.advance(&mut job, JobState::Succeeded, None);
                    return job;
                }
                Attempt::Finished(Err(error)) => {
                    match self.policy.decide(job.attempts(), &error) {
                        RetryDecision::Retry { after } => {
                            tracing::warn!(
                                image = %job.reference(),
                                attempt = job.attempts(),
                                delay_ms = after.as_millis() as u64,
                                error = %error,
                                "transient pull failure, backing off"
                            );
                            self.advance(&mut job, JobState::Retrying, Some(error));
                            drop(permit);

                            if !self.backoff(after).await {
                                self.advance(
                                    &mut job,
                                    JobState::Abandoned,
                                    Some(PullError::Cancelled),
                                );
                                return job;
                            }
                        }
                        RetryDecision::GiveUp => {
                            let next = if error.is_transient() {
                                JobState::Abandoned
                            } else {
                                JobState::Failed
                            };
                            tracing::warn!(
                                image = %job.reference(),
                                attempts = job.attempts(),
                                error = %error,
                                "pull {}",
                                next
                            );
                            self.advance(&mut job, next, Some(error));
                            return job;
                        }
                    }
                }
                Attempt::Cancelled(Some(Ok(()))) => {
                    self.advance(&mut job, JobState::Succeeded, None);
                    return job;
                }
                Attempt::Cancelled(Some(Err(error))) if !error.is_transient() => {
                    self.advance(&mut job, JobState::Failed, Some(error));
                    return job;
                }
                Attempt::Cancelled(_) => {
                    tracing::debug!(image = %job.reference(), "abandoning in-flight pull");
                    self.advance(&mut job, JobState::Abandoned, Some(PullError::Cancelled));
                    return job;
                }
            }
        }
    }

    /// Wait for a free slot. Returns `None` if cancelled first.
    async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        }
    }

    /// Sleep for `delay`. Returns `false` if cancelled first.
    async fn backoff(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn attempt(&self, reference: &ImageRef) -> Attempt {
        let limit = self.attempt_timeout;
        let call = async {
            match tokio::time::timeout(limit, self.client.pull(reference, limit)).await {
                Ok(result) => result,
                Err(_) => Err(PullError::Timeout(limit)),
            }
        };
        tokio::pin!(call);

        tokio::select! {
            biased;
            result = &mut call => return Attempt::Finished(result),
            _ = self.cancel.cancelled() => {}
        }

        match tokio::time::timeout(self.cancel_grace, &mut call).await {
            Ok(result) => Attempt::Cancelled(Some(result)),
            Err(_) => Attempt::Cancelled(None),
        }
    }

    fn advance(&self, job: &mut PullJob, next: JobState, error: Option<PullError>) {
        match job.transition(next, error) {
            Ok(event) => self.progress.apply(event),
            Err(e) => tracing::error!("{}", e),
        }
    }
}
