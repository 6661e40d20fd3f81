// ABOUTME: Pull job execution: state machine, retry policy, and worker pool.
// ABOUTME: The orchestrator composes these into a full run.

mod cancel;
mod job;
mod pool;
mod retry;

pub use cancel::CancelSignal;
pub use job::{InvalidTransition, JobState, ProgressEvent, PullJob, PullResult};
pub use pool::WorkerPool;
pub use retry::{RetryConfig, RetryDecision, RetryPolicy};
