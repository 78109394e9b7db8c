//! Step scheduling: one pass over a workflow's steps

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::action::TextAction;
use super::context::EvaluationContext;
use super::dependency::topological_order;
use super::entity::{Step, StepId, Workflow, WorkflowId};
use super::error::WorkflowError;
use super::evaluator::{ConditionEvaluationError, ConditionEvaluator};
use super::resolver::{ActionResolver, ResolutionError};

/// Lifecycle of a step within a single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Eligible,
    Fired,
    Completed,
    Skipped,
}

/// Order in which a pass visits steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOrdering {
    /// Ascending `index`, ties broken by id
    #[default]
    Index,
    /// Dependencies first, ties broken by `index`; cycles fail the pass
    Topological,
}

impl std::str::FromStr for StepOrdering {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "topological" => Ok(Self::Topological),
            other => Err(WorkflowError::invalid_input(format!(
                "Unknown step ordering '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Step,
    Workflow,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step => write!(f, "step"),
            Self::Workflow => write!(f, "workflow"),
        }
    }
}

/// Per-step failure. The step stays pending and is retried on the next pass.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    #[error("Condition evaluation failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ConditionEvaluation(Vec<ConditionEvaluationError>),

    #[error(transparent)]
    ResolutionFailed(ResolutionError),

    #[error("Condition references unknown {kind} '{id}'")]
    InvalidReference { kind: ReferenceKind, id: String },
}

impl StepError {
    pub fn is_condition_evaluation(&self) -> bool {
        matches!(self, Self::ConditionEvaluation(_))
    }

    pub fn is_resolution_failed(&self) -> bool {
        matches!(self, Self::ResolutionFailed(_))
    }
}

/// Everything one pass produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassOutcome {
    /// Steps completed in this pass, in firing order
    pub completed_step_ids: Vec<StepId>,
    pub terminal_actions: BTreeMap<StepId, Vec<TextAction>>,
    pub errors: BTreeMap<StepId, StepError>,
    pub states: BTreeMap<StepId, StepState>,
}

impl PassOutcome {
    pub fn state_of(&self, id: &StepId) -> Option<StepState> {
        self.states.get(id).copied()
    }

    pub fn is_completed(&self, id: &StepId) -> bool {
        self.state_of(id) == Some(StepState::Completed)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn pending_step_ids(&self) -> Vec<&StepId> {
        self.states
            .iter()
            .filter(|(_, state)| **state == StepState::Pending)
            .map(|(id, _)| id)
            .collect()
    }
}

/// Runs scheduling passes; holds only shared collaborators and is safe to
/// use from many workflow instances at once
#[derive(Clone)]
pub struct StepScheduler {
    evaluator: ConditionEvaluator,
    resolver: ActionResolver,
    ordering: StepOrdering,
}

impl StepScheduler {
    pub fn new(evaluator: ConditionEvaluator, resolver: ActionResolver) -> Self {
        Self {
            evaluator,
            resolver,
            ordering: StepOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: StepOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn ordering(&self) -> StepOrdering {
        self.ordering
    }

    /// Run one pass over `steps`, updating `context` as steps complete.
    ///
    /// Only structural problems fail the pass. Condition and resolution
    /// failures are reported per step in [`PassOutcome::errors`].
    pub async fn run_pass(
        &self,
        workflow: &Workflow,
        steps: &[Step],
        context: &mut EvaluationContext,
    ) -> Result<PassOutcome, WorkflowError> {
        check_structure(workflow, steps)?;

        let mut outcome = PassOutcome::default();

        if !workflow.is_active() {
            debug!("Workflow '{}' is inactive; skipping all steps", workflow.id());
            outcome.states = steps
                .iter()
                .map(|step| (step.id().clone(), StepState::Skipped))
                .collect();
            return Ok(outcome);
        }

        let ordered = self.order(steps)?;
        let own_steps: BTreeSet<&StepId> = steps.iter().map(Step::id).collect();
        let mut known_workflows = context.known_workflows().clone();
        known_workflows.insert(workflow.id().clone());

        for step in ordered {
            let state = self
                .visit(step, context, &own_steps, &known_workflows, &mut outcome)
                .await;
            outcome.states.insert(step.id().clone(), state);
        }

        info!(
            "Pass over workflow '{}' completed {} of {} step(s), {} error(s)",
            workflow.id(),
            outcome.completed_step_ids.len(),
            steps.len(),
            outcome.errors.len()
        );

        Ok(outcome)
    }

    fn order<'a>(&self, steps: &'a [Step]) -> Result<Vec<&'a Step>, WorkflowError> {
        match self.ordering {
            StepOrdering::Index => {
                let mut ordered: Vec<&Step> = steps.iter().collect();
                ordered.sort_by(|a, b| a.index().cmp(&b.index()).then_with(|| a.id().cmp(b.id())));
                Ok(ordered)
            }
            StepOrdering::Topological => topological_order(steps),
        }
    }

    async fn visit(
        &self,
        step: &Step,
        context: &mut EvaluationContext,
        own_steps: &BTreeSet<&StepId>,
        known_workflows: &BTreeSet<WorkflowId>,
        outcome: &mut PassOutcome,
    ) -> StepState {
        if !step.is_active() {
            debug!("Step '{}' is inactive", step.id());
            return StepState::Skipped;
        }

        if !step.repeat() && context.is_step_completed(step.id()) {
            debug!("Step '{}' already completed and does not repeat", step.id());
            return StepState::Skipped;
        }

        if let Some(err) = invalid_reference(step, context, own_steps, known_workflows) {
            debug!("Step '{}' has an invalid reference: {}", step.id(), err);
            outcome.errors.insert(step.id().clone(), err);
            return StepState::Pending;
        }

        let evaluation = self.evaluator.evaluate_all(step.conditions(), context).await;
        if !evaluation.satisfied {
            if evaluation.has_errors() {
                outcome.errors.insert(
                    step.id().clone(),
                    StepError::ConditionEvaluation(evaluation.errors),
                );
            }
            return StepState::Pending;
        }

        debug!("Step '{}' is eligible; firing", step.id());

        let mut texts = Vec::with_capacity(step.actions().len());
        for action in step.actions() {
            match self.resolver.resolve(action, step.beast_mode()).await {
                Ok(resolution) => texts.push(resolution.action),
                Err(err) => {
                    debug!("Step '{}' could not resolve an action: {}", step.id(), err);
                    outcome
                        .errors
                        .insert(step.id().clone(), StepError::ResolutionFailed(err));
                    return StepState::Pending;
                }
            }
        }

        context.mark_step_completed(step.id().clone());
        outcome.completed_step_ids.push(step.id().clone());
        outcome.terminal_actions.insert(step.id().clone(), texts);

        debug!("Step '{}' completed", step.id());
        StepState::Completed
    }
}

fn check_structure(workflow: &Workflow, steps: &[Step]) -> Result<(), WorkflowError> {
    let mut seen = BTreeSet::new();

    for step in steps {
        if step.workflow_id() != workflow.id() {
            return Err(WorkflowError::validation(format!(
                "Step '{}' belongs to workflow '{}', not '{}'",
                step.id(),
                step.workflow_id(),
                workflow.id()
            )));
        }

        if !seen.insert(step.id()) {
            return Err(WorkflowError::validation(format!(
                "Duplicate step '{}' in workflow '{}'",
                step.id(),
                workflow.id()
            )));
        }
    }

    Ok(())
}

/// Step ids resolve against the workflow's own steps, then the tenant-wide
/// steps the context knows about
fn invalid_reference(
    step: &Step,
    context: &EvaluationContext,
    own_steps: &BTreeSet<&StepId>,
    known_workflows: &BTreeSet<WorkflowId>,
) -> Option<StepError> {
    let conditions = step.conditions();

    let missing_step = conditions
        .iter()
        .flat_map(|condition| condition.step_ids())
        .find(|id| !own_steps.contains(id) && !context.is_known_step(id));
    if let Some(id) = missing_step {
        return Some(StepError::InvalidReference {
            kind: ReferenceKind::Step,
            id: id.to_string(),
        });
    }

    conditions
        .iter()
        .flat_map(|condition| condition.workflow_ids())
        .find(|id| !known_workflows.contains(id))
        .map(|id| StepError::InvalidReference {
            kind: ReferenceKind::Workflow,
            id: id.to_string(),
        })
}
