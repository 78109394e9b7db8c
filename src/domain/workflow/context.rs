//! Per-pass evaluation context

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::condition::UiEvent;
use super::entity::{StepId, WorkflowId};

/// What one workflow instance has completed or observed so far.
///
/// A context belongs to a single workflow instance (e.g. one end-user
/// session) and must only be mutated by the pass currently running for that
/// instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    #[serde(default)]
    completed_steps: BTreeSet<StepId>,

    #[serde(default)]
    completed_workflows: BTreeSet<WorkflowId>,

    #[serde(default)]
    observed_events: BTreeSet<UiEvent>,

    /// Workflow identities of the tenant's data set, used to validate
    /// `WorkflowRef` conditions
    #[serde(default)]
    known_workflows: BTreeSet<WorkflowId>,

    /// Step identities from other workflows of the tenant, used to validate
    /// `StepRef` and `AgentJudged` conditions
    #[serde(default)]
    known_steps: BTreeSet<StepId>,

    /// Verdicts delivered by an agent ahead of evaluation, keyed by the
    /// judged step
    #[serde(default)]
    judgments: BTreeMap<StepId, bool>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    // Builder methods

    pub fn with_completed_step(mut self, id: StepId) -> Self {
        self.completed_steps.insert(id);
        self
    }

    pub fn with_completed_workflow(mut self, id: WorkflowId) -> Self {
        self.known_workflows.insert(id.clone());
        self.completed_workflows.insert(id);
        self
    }

    pub fn with_event(mut self, event: UiEvent) -> Self {
        self.observed_events.insert(event);
        self
    }

    pub fn with_known_workflows(mut self, ids: impl IntoIterator<Item = WorkflowId>) -> Self {
        self.known_workflows.extend(ids);
        self
    }

    pub fn with_known_steps(mut self, ids: impl IntoIterator<Item = StepId>) -> Self {
        self.known_steps.extend(ids);
        self
    }

    pub fn with_judgment(mut self, step_id: StepId, accepted: bool) -> Self {
        self.judgments.insert(step_id, accepted);
        self
    }

    // Queries

    pub fn completed_steps(&self) -> &BTreeSet<StepId> {
        &self.completed_steps
    }

    pub fn completed_workflows(&self) -> &BTreeSet<WorkflowId> {
        &self.completed_workflows
    }

    pub fn observed_events(&self) -> &BTreeSet<UiEvent> {
        &self.observed_events
    }

    pub fn known_workflows(&self) -> &BTreeSet<WorkflowId> {
        &self.known_workflows
    }

    pub fn known_steps(&self) -> &BTreeSet<StepId> {
        &self.known_steps
    }

    pub fn judgments(&self) -> &BTreeMap<StepId, bool> {
        &self.judgments
    }

    pub fn is_step_completed(&self, id: &StepId) -> bool {
        self.completed_steps.contains(id)
    }

    pub fn is_workflow_completed(&self, id: &WorkflowId) -> bool {
        self.completed_workflows.contains(id)
    }

    pub fn has_event(&self, event: UiEvent) -> bool {
        self.observed_events.contains(&event)
    }

    pub fn is_known_workflow(&self, id: &WorkflowId) -> bool {
        self.known_workflows.contains(id)
    }

    /// A step is known once registered or completed
    pub fn is_known_step(&self, id: &StepId) -> bool {
        self.known_steps.contains(id) || self.completed_steps.contains(id)
    }

    pub fn judgment(&self, step_id: &StepId) -> Option<bool> {
        self.judgments.get(step_id).copied()
    }

    // Mutation

    /// Record a step completion. Returns `false` if it was already recorded.
    pub fn mark_step_completed(&mut self, id: StepId) -> bool {
        self.completed_steps.insert(id)
    }

    /// Record a workflow completion. Returns `false` if it was already recorded.
    pub fn mark_workflow_completed(&mut self, id: WorkflowId) -> bool {
        self.known_workflows.insert(id.clone());
        self.completed_workflows.insert(id)
    }

    /// Record an observed UI event. Returns `false` if it was already observed.
    pub fn record_event(&mut self, event: UiEvent) -> bool {
        self.observed_events.insert(event)
    }

    pub fn register_workflow(&mut self, id: WorkflowId) {
        self.known_workflows.insert(id);
    }

    pub fn register_step(&mut self, id: StepId) {
        self.known_steps.insert(id);
    }

    /// Record a verdict for a judged step, replacing any earlier one
    pub fn record_judgment(&mut self, step_id: StepId, accepted: bool) -> Option<bool> {
        self.judgments.insert(step_id, accepted)
    }

    /// Forget observed events, keeping completions
    pub fn clear_events(&mut self) {
        self.observed_events.clear();
    }
}
