//! Step sequencer
//!
//! A [`Pipeline`] is an ordered list of named steps run strictly one after
//! another. The first step that returns `Err` aborts the run; its error is
//! wrapped in [`Error::Step`] so the caller knows where the run stopped.
//! Soft failures are a step's own business and never reach the sequencer.

use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::time::Instant;
use tracing::{error, info};

use crate::{Error, Result};

struct Step<'a> {
    name: String,
    action: LocalBoxFuture<'a, Result<()>>,
}

/// Ordered, fail-fast list of named steps
pub struct Pipeline<'a> {
    name: String,
    steps: Vec<Step<'a>>,
}

/// Timing of one completed step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Wall-clock time the step took
    pub elapsed: Duration,
}

/// What a successful run did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Every step, in execution order
    pub steps: Vec<StepRecord>,
}

impl PipelineReport {
    /// Names of the steps that ran
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

impl<'a> Pipeline<'a> {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step. The future is not polled until [`Pipeline::run`].
    pub fn step<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: std::future::Future<Output = Result<()>> + 'a,
    {
        self.steps.push(Step {
            name: name.into(),
            action: Box::pin(action),
        });
        self
    }

    /// Append every step of another pipeline
    pub fn extend(mut self, other: Pipeline<'a>) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(self) -> Result<PipelineReport> {
        let total = self.steps.len();
        let mut report = PipelineReport::default();

        for (i, step) in self.steps.into_iter().enumerate() {
            info!("[{} {}/{}] {}", self.name, i + 1, total, step.name);
            let started = Instant::now();

            if let Err(e) = step.action.await {
                error!(
                    pipeline = %self.name,
                    step = %step.name,
                    error = %e,
                    "step failed, aborting"
                );
                return Err(Error::step(step.name, e));
            }

            report.steps.push(StepRecord {
                name: step.name,
                elapsed: started.elapsed(),
            });
        }

        info!(pipeline = %self.name, steps = total, "pipeline complete");
        Ok(report)
    }
}
