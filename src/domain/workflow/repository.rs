//! Workflow repository trait

use async_trait::async_trait;

use super::context::EvaluationContext;
use super::entity::{Step, StepId, Workflow, WorkflowId};
use crate::domain::DomainError;

/// Repository trait for workflow and step persistence
#[async_trait]
pub trait WorkflowRepository: Send + Sync + std::fmt::Debug {
    /// Get a workflow by ID
    async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError>;

    /// List all workflows
    async fn list(&self) -> Result<Vec<Workflow>, DomainError>;

    /// List only active workflows
    async fn list_active(&self) -> Result<Vec<Workflow>, DomainError>;

    /// Create a new workflow
    async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError>;

    /// Update an existing workflow
    async fn update(&self, workflow: Workflow) -> Result<Workflow, DomainError>;

    /// Delete a workflow and all of its steps
    async fn delete(&self, id: &WorkflowId) -> Result<bool, DomainError>;

    /// Check if a workflow exists
    async fn exists(&self, id: &WorkflowId) -> Result<bool, DomainError>;

    /// Load every step of a workflow
    async fn load_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<Step>, DomainError>;

    /// Create or replace a step; the owning workflow must exist
    async fn save_step(&self, step: Step) -> Result<Step, DomainError>;

    /// Delete a step from a workflow
    async fn delete_step(&self, workflow_id: &WorkflowId, step_id: &StepId)
        -> Result<bool, DomainError>;

    /// Persist that a step completed for the instance described by `context`
    async fn record_step_completion(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        context: &EvaluationContext,
    ) -> Result<(), DomainError>;
}
