// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted registry client and tracing setup for integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulley::config::PullConfig;
use pulley::pull::RetryConfig;
use pulley::runtime::{PullError, RegistryClient};
use pulley::types::ImageRef;
use std::collections::{HashMap, VecDeque};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("pulley=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Config with millisecond backoff and no jitter.
#[allow(dead_code)]
pub fn fast_config(concurrency: usize, max_attempts: u32) -> PullConfig {
    PullConfig {
        concurrency,
        attempt_timeout: Duration::from_secs(5),
        timeout: None,
        cancel_grace: Duration::from_millis(10),
        retry: RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        },
    }
}

#[allow(dead_code)]
pub fn refs(names: &[&str]) -> Vec<ImageRef> {
    names.iter().map(|n| ImageRef::parse(n).unwrap()).collect()
}

/// What a single pull call does.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    OkAfter(Duration),
    Fail(PullError),
    /// Never returns.
    Hang,
    /// Panics inside the pull, killing the worker task.
    Panic,
}

/// Registry client that replays scripted outcomes per image.
///
/// Once an image's script runs out, the default step repeats.
pub struct ScriptedRegistry {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    default: Step,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedRegistry {
    pub fn new(default: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps this long before resolving its step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, image: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .insert(image.to_string(), steps.into_iter().collect());
        self
    }

    pub fn calls_for(&self, image: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == image).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, image: &str) -> Step {
        self.scripts
            .lock()
            .get_mut(image)
            .and_then(|steps| steps.pop_front())
            .unwrap_or_else(|| self.default.clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn pull(&self, reference: &ImageRef, _timeout: Duration) -> Result<(), PullError> {
        self.calls.lock().push(reference.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let step = self.next_step(reference.as_str());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Step::Ok => Ok(()),
            Step::OkAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("registry client blew up pulling {reference}"),
        }
    }
}
