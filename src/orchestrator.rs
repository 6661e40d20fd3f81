// ABOUTME: Top-level pull orchestration.
// ABOUTME: Deduplicates references, runs the worker pool, and reports ordered results.

use std::sync::Arc;

use crate::config::PullConfig;
use crate::error::SetupError;
use crate::progress::{ProgressAggregator, PullSummary};
use crate::pull::{CancelSignal, PullJob, PullResult, WorkerPool};
use crate::runtime::RegistryClient;
use crate::types::{ImageRef, dedup_references};

/// Parse raw strings into references, failing on the first invalid one.
pub fn parse_references<I, S>(raw: I) -> Result<Vec<ImageRef>, SetupError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|s| ImageRef::parse(s.as_ref()).map_err(SetupError::from))
        .collect()
}

/// Pulls a set of images through one registry client.
///
/// Each run starts with empty progress; snapshots and the summary only ever
/// describe the current or most recent run.
pub struct Orchestrator {
    client: Arc<dyn RegistryClient>,
    config: PullConfig,
    progress: Arc<ProgressAggregator>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn RegistryClient>, config: PullConfig) -> Self {
        Self {
            client,
            config,
            progress: Arc::new(ProgressAggregator::new()),
        }
    }

    pub fn config(&self) -> &PullConfig {
        &self.config
    }

    /// Live progress; subscribe before calling [`run`](Self::run) to see every event.
    pub fn progress(&self) -> Arc<ProgressAggregator> {
        self.progress.clone()
    }

    /// Pull every reference and return one result per unique reference.
    ///
    /// # Errors
    ///
    /// Returns `SetupError` for an empty input or an invalid configuration.
    /// Failed pulls are reported in the results, never as an error.
    pub async fn run<I>(&self, references: I) -> Result<Vec<PullResult>, SetupError>
    where
        I: IntoIterator<Item = ImageRef>,
    {
        self.run_until(references, CancelSignal::new()).await
    }

    /// Like [`run`](Self::run), stopping early when `cancel` fires.
    ///
    /// Jobs that had not succeeded or failed by then are reported Abandoned.
    pub async fn run_until<I>(
        &self,
        references: I,
        cancel: CancelSignal,
    ) -> Result<Vec<PullResult>, SetupError>
    where
        I: IntoIterator<Item = ImageRef>,
    {
        self.config.validate()?;
        let unique = dedup_references(references).ok_or(SetupError::EmptyInput)?;

        tracing::info!(
            images = unique.len(),
            concurrency = self.config.concurrency,
            max_attempts = self.config.retry.max_attempts,
            "starting pull run"
        );

        self.progress.reset();
        let jobs: Vec<PullJob> = unique.into_iter().map(PullJob::new).collect();
        let pool = WorkerPool::from_config(&self.config);

        let deadline = self.config.timeout.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(timeout = ?limit, "pull run timed out, cancelling");
                cancel.cancel();
            })
        });

        let results = pool
            .run(jobs, self.client.clone(), self.progress.clone(), cancel)
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        self.progress.complete(results.clone());
        if let Some(summary) = self.progress.summary() {
            tracing::info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                abandoned = summary.abandoned,
                "pull run finished"
            );
        }

        Ok(results)
    }

    /// Final summary of the last completed run.
    pub fn summary(&self) -> Option<PullSummary> {
        self.progress.summary()
    }
}
