//! Staged sync orchestrator
//!
//! Walks the sync order one Application at a time. For each that exists:
//! enable automated sync, request a refresh, then wait until it is Synced and
//! Healthy or its own timeout passes. A timeout, a missing Application or a
//! failed patch is logged and the walk moves on. Ordering is enforced (an
//! Application is only attempted after the previous one finished or timed
//! out) but convergence is not, so a full pass always succeeds.

use std::fmt;
use std::time::Duration;

use gantry_common::poll::poll_until;
use gantry_common::{Kind, ObjectStore};
use serde_json::json;
use tracing::{info, warn};

use crate::application::{get_status, list_statuses, AppStatus, REFRESH_ANNOTATION};
use crate::policy::{set_automation, AutomationFlag};

/// Default per-Application wait
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between status checks
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// What happened to one Application
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Reached Synced and Healthy
    Converged,
    /// Still not Synced and Healthy when its timeout passed
    TimedOut,
    /// Did not exist
    Skipped,
    /// Could not be patched
    Failed(String),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Converged => f.write_str("converged"),
            SyncOutcome::TimedOut => f.write_str("timed out"),
            SyncOutcome::Skipped => f.write_str("skipped"),
            SyncOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of a full pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outcome per Application, in sync order
    pub outcomes: Vec<(String, SyncOutcome)>,
    /// Status of every Application after the pass
    pub statuses: Vec<AppStatus>,
}

impl SyncReport {
    /// Names with the given outcome
    pub fn with_outcome(&self, outcome: &SyncOutcome) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o == outcome)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Applications that were patched and polled
    pub fn processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SyncOutcome::Converged | SyncOutcome::TimedOut))
            .count()
    }
}

/// Syncs Applications in a fixed order
pub struct StagedSync<'a> {
    store: &'a dyn ObjectStore,
    namespace: String,
    timeout: Duration,
    interval: Duration,
}

impl<'a> StagedSync<'a> {
    /// Create an orchestrator for Applications in `namespace`
    pub fn new(store: &'a dyn ObjectStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            timeout: DEFAULT_SYNC_TIMEOUT,
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Per-Application wait
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval between status checks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn sync_one(&self, name: &str) -> SyncOutcome {
        let ns = self.namespace.as_str();
        match self.store.get(&Kind::APPLICATION, Some(ns), name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(app = %name, "application not found, skipping");
                return SyncOutcome::Skipped;
            }
            Err(e) => {
                warn!(app = %name, error = %e, "failed to read application, skipping");
                return SyncOutcome::Failed(e.to_string());
            }
        }

        if let Err(e) = set_automation(self.store, ns, name, AutomationFlag::Enabled).await {
            warn!(app = %name, error = %e, "failed to enable automated sync");
            return SyncOutcome::Failed(e.to_string());
        }

        let refresh = json!({"metadata": {"annotations": {REFRESH_ANNOTATION: "normal"}}});
        if let Err(e) = self
            .store
            .patch(&Kind::APPLICATION, Some(ns), name, &refresh)
            .await
        {
            warn!(app = %name, error = %e, "failed to request refresh");
            return SyncOutcome::Failed(e.to_string());
        }

        let description = format!("{} Synced and Healthy", name);
        let converged = poll_until(&description, self.interval, self.timeout, || async move {
            Ok(get_status(self.store, ns, name)
                .await?
                .is_some_and(|s| s.is_converged()))
        })
        .await;

        if converged.is_ready() {
            info!(app = %name, "Synced and Healthy");
            SyncOutcome::Converged
        } else {
            warn!(
                app = %name,
                timeout_secs = self.timeout.as_secs(),
                "not Synced and Healthy in time, moving on"
            );
            SyncOutcome::TimedOut
        }
    }

    /// Walk `order` once. Never fails: per-Application problems are recorded
    /// in the report.
    pub async fn run(&self, order: &[String]) -> SyncReport {
        let mut report = SyncReport::default();

        for (i, name) in order.iter().enumerate() {
            info!(app = %name, "[Stage {}/{}] syncing", i + 1, order.len());
            let outcome = self.sync_one(name).await;
            report.outcomes.push((name.clone(), outcome));
        }

        report.statuses = match list_statuses(self.store, &self.namespace).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, "failed to list applications for the summary");
                Vec::new()
            }
        };

        info!(
            processed = report.processed(),
            converged = report.with_outcome(&SyncOutcome::Converged).len(),
            timed_out = report.with_outcome(&SyncOutcome::TimedOut).len(),
            skipped = report.with_outcome(&SyncOutcome::Skipped).len(),
            "staged sync finished"
        );
        report
    }
}
