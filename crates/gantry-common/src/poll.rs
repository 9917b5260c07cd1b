//! Readiness gates: fixed-interval polling against live state
//!
//! Every wait in gantry goes through one of three shapes:
//! - [`poll_until`]: deadline measured from the call
//! - [`poll_until_deadline`]: deadline owned by the caller, so several waits
//!   can share one budget
//! - [`poll_attempts`]: a bounded number of checks rather than a deadline
//!
//! A check that errors counts as "not yet". The sleep before the final check
//! is clamped to the remaining budget, so a wait never blocks past its deadline
//! by more than the duration of one check.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::Result;

/// Outcome of a deadline-bounded wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The predicate was observed true
    Ready,
    /// The deadline passed first
    TimedOut,
}

impl Readiness {
    /// Whether the predicate was observed true
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// A wall-clock budget that starts when it is created
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a budget now
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Total budget
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time since the budget started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// Whether the budget is used up
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Poll `check` every `interval` until it returns `Ok(true)` or `timeout`
/// elapses, measured from this call.
pub async fn poll_until<F, Fut>(
    description: &str,
    interval: Duration,
    timeout: Duration,
    check: F,
) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_until_deadline(description, interval, &Deadline::start(timeout), check).await
}

/// Poll `check` every `interval` until it returns `Ok(true)` or `deadline`
/// expires.
///
/// `check` always runs at least once, even against an expired deadline.
pub async fn poll_until_deadline<F, Fut>(
    description: &str,
    interval: Duration,
    deadline: &Deadline,
    mut check: F,
) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    loop {
        match check().await {
            Ok(true) => return Readiness::Ready,
            Ok(false) => trace!(description, "not ready yet"),
            Err(e) => trace!(description, error = %e, "check failed, treating as not ready"),
        }

        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Readiness::TimedOut;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }
}

/// Result of a single check in an attempt-bounded wait
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Probe {
    /// Condition met
    Ready,
    /// Not yet, keep polling
    Pending,
    /// A terminal state that will never become ready
    Terminal(String),
}

impl From<bool> for Probe {
    fn from(ready: bool) -> Self {
        if ready {
            Probe::Ready
        } else {
            Probe::Pending
        }
    }
}

/// Outcome of an attempt-bounded wait
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settled {
    /// The condition was met on the given attempt (1-based)
    Ready(u32),
    /// Every attempt was used without the condition being met
    Exhausted,
    /// The watched object reached a terminal failure state
    Terminal(String),
}

impl Settled {
    /// Whether the condition was met
    pub fn is_ready(&self) -> bool {
        matches!(self, Settled::Ready(_))
    }
}

/// Run `check` up to `attempts` times, sleeping `interval` between checks.
pub async fn poll_attempts<F, Fut>(
    description: &str,
    attempts: u32,
    interval: Duration,
    mut check: F,
) -> Settled
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe>>,
{
    for attempt in 1..=attempts {
        match check().await {
            Ok(Probe::Ready) => return Settled::Ready(attempt),
            Ok(Probe::Terminal(reason)) => return Settled::Terminal(reason),
            Ok(Probe::Pending) => trace!(description, attempt, attempts, "not ready yet"),
            Err(e) => {
                trace!(description, attempt, error = %e, "check failed, treating as not ready")
            }
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Settled::Exhausted
}
