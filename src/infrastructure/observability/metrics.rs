//! Engine metrics recorded through the `metrics` facade.
//!
//! No exporter is installed here; without a recorder the calls are no-ops.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::domain::{PassOutcome, StepError, WorkflowId};

/// Counts derived from one pass outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassMetrics {
    pub steps_completed: u64,
    pub resolution_failures: u64,
    pub judge_failures: u64,
}

impl PassMetrics {
    pub fn from_outcome(outcome: &PassOutcome) -> Self {
        let mut metrics = Self {
            steps_completed: outcome.completed_step_ids.len() as u64,
            ..Self::default()
        };

        for error in outcome.errors.values() {
            match error {
                StepError::ConditionEvaluation(errors) => {
                    metrics.judge_failures += errors.len() as u64;
                }
                StepError::ResolutionFailed(_) => metrics.resolution_failures += 1,
                StepError::InvalidReference { .. } => {}
            }
        }

        metrics
    }
}

/// Record a completed pass
pub fn record_pass(workflow_id: &WorkflowId, outcome: &PassOutcome, duration: Duration) {
    let labels = [("workflow", workflow_id.to_string())];
    let metrics = PassMetrics::from_outcome(outcome);

    counter!("step_engine_passes_total", &labels).increment(1);
    histogram!("step_engine_pass_duration_seconds", &labels).record(duration.as_secs_f64());

    if metrics.steps_completed > 0 {
        counter!("step_engine_steps_completed_total", &labels).increment(metrics.steps_completed);
    }

    if metrics.resolution_failures > 0 {
        counter!("step_engine_resolution_failures_total", &labels)
            .increment(metrics.resolution_failures);
    }

    if metrics.judge_failures > 0 {
        counter!("step_engine_judge_failures_total", &labels).increment(metrics.judge_failures);
    }
}
