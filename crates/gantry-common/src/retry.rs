//! Fixed-interval retry for calls the API server rejects until something
//! else has happened, such as an operator registering its CRDs.
//!
//! There is no backoff and no jitter. [`Attempts::Unbounded`] never gives up.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// How many times an operation may run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempts {
    /// Retry until the operation succeeds
    Unbounded,
    /// Give up after this many failed runs
    AtMost(u32),
}

impl Attempts {
    fn exhausted(self, attempt: u32) -> bool {
        match self {
            Attempts::Unbounded => false,
            Attempts::AtMost(max) => attempt >= max,
        }
    }
}

/// Retry policy: attempt budget and the pause between attempts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt budget
    pub attempts: Attempts,
    /// Pause after each failure
    pub interval: Duration,
}

impl RetryPolicy {
    /// Retry forever every `interval`
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            attempts: Attempts::Unbounded,
            interval,
        }
    }

    /// Run at most `max` times, `interval` apart
    pub fn at_most(max: u32, interval: Duration) -> Self {
        Self {
            attempts: Attempts::AtMost(max),
            interval,
        }
    }
}

/// A successful result and the run that produced it (1-based)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retried<T> {
    /// Value returned by the successful run
    pub value: T,
    /// Number of runs, including the successful one
    pub attempts: u32,
}

/// Run `operation` until it succeeds or the policy's budget is spent.
///
/// Every failure is logged at warn; the last error is returned once the
/// budget is exhausted.
pub async fn retry<F, Fut, T, E>(
    policy: RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<Retried<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        let e = match operation().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(e) => e,
        };

        if policy.attempts.exhausted(attempt) {
            error!(what, attempt, error = %e, "giving up");
            return Err(e);
        }
        warn!(
            what,
            attempt,
            error = %e,
            retry_in_secs = policy.interval.as_secs(),
            "rejected, retrying"
        );
        tokio::time::sleep(policy.interval).await;
    }
}
