//! In-memory workflow repository implementation

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{
    DomainError, EvaluationContext, Step, StepId, Workflow, WorkflowId, WorkflowRepository,
};

#[derive(Debug, Default)]
struct Store {
    workflows: HashMap<String, Workflow>,
    steps: HashMap<String, Vec<Step>>,
    completions: HashMap<String, BTreeSet<StepId>>,
}

/// In-memory implementation of WorkflowRepository
#[derive(Debug)]
pub struct InMemoryWorkflowRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryWorkflowRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    /// Import a workflow together with its steps, replacing any previous copy
    pub async fn import(&self, mut workflow: Workflow, steps: Vec<Step>) -> Result<(), DomainError> {
        for step in &steps {
            if step.workflow_id() != workflow.id() {
                return Err(DomainError::validation(format!(
                    "Step '{}' belongs to workflow '{}', not '{}'",
                    step.id(),
                    step.workflow_id(),
                    workflow.id()
                )));
            }
            workflow.add_step_id(step.id().clone());
        }

        let key = workflow.id().as_str().to_string();
        let mut store = self.store.write().await;
        store.steps.insert(key.clone(), steps);
        store.workflows.insert(key, workflow);
        Ok(())
    }

    /// Steps recorded as completed for a workflow
    pub async fn completions(&self, workflow_id: &WorkflowId) -> BTreeSet<StepId> {
        let store = self.store.read().await;
        store
            .completions
            .get(workflow_id.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError> {
        let store = self.store.read().await;
        Ok(store.workflows.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<Workflow>, DomainError> {
        let store = self.store.read().await;
        let mut workflows: Vec<Workflow> = store.workflows.values().cloned().collect();
        workflows.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(workflows)
    }

    async fn list_active(&self) -> Result<Vec<Workflow>, DomainError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|w| w.is_active())
            .collect())
    }

    async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
        let mut store = self.store.write().await;

        if store.workflows.contains_key(workflow.id().as_str()) {
            return Err(DomainError::conflict(format!(
                "Workflow '{}' already exists",
                workflow.id()
            )));
        }

        store
            .workflows
            .insert(workflow.id().as_str().to_string(), workflow.clone());
        Ok(workflow)
    }

    async fn update(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
        let mut store = self.store.write().await;

        if !store.workflows.contains_key(workflow.id().as_str()) {
            return Err(DomainError::not_found(format!(
                "Workflow '{}' not found",
                workflow.id()
            )));
        }

        store
            .workflows
            .insert(workflow.id().as_str().to_string(), workflow.clone());
        Ok(workflow)
    }

    async fn delete(&self, id: &WorkflowId) -> Result<bool, DomainError> {
        let mut store = self.store.write().await;
        let removed_steps = store.steps.remove(id.as_str()).map_or(0, |s| s.len());
        store.completions.remove(id.as_str());

        let deleted = store.workflows.remove(id.as_str()).is_some();
        if deleted {
            debug!("Deleted workflow '{}' and {} step(s)", id, removed_steps);
        }
        Ok(deleted)
    }

    async fn exists(&self, id: &WorkflowId) -> Result<bool, DomainError> {
        let store = self.store.read().await;
        Ok(store.workflows.contains_key(id.as_str()))
    }

    async fn load_steps(&self, workflow_id: &WorkflowId) -> Result<Vec<Step>, DomainError> {
        let store = self.store.read().await;

        if !store.workflows.contains_key(workflow_id.as_str()) {
            return Err(DomainError::not_found(format!(
                "Workflow '{}' not found",
                workflow_id
            )));
        }

        Ok(store
            .steps
            .get(workflow_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn save_step(&self, step: Step) -> Result<Step, DomainError> {
        let mut guard = self.store.write().await;
        let store = &mut *guard;
        let key = step.workflow_id().as_str().to_string();

        let Some(workflow) = store.workflows.get_mut(&key) else {
            return Err(DomainError::not_found(format!(
                "Workflow '{}' not found",
                step.workflow_id()
            )));
        };
        workflow.add_step_id(step.id().clone());

        let steps = store.steps.entry(key).or_default();
        match steps.iter_mut().find(|s| s.id() == step.id()) {
            Some(existing) => *existing = step.clone(),
            None => steps.push(step.clone()),
        }

        Ok(step)
    }

    async fn delete_step(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
    ) -> Result<bool, DomainError> {
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        if let Some(workflow) = store.workflows.get_mut(workflow_id.as_str()) {
            workflow.remove_step_id(step_id);
        }

        let Some(steps) = store.steps.get_mut(workflow_id.as_str()) else {
            return Ok(false);
        };
        let before = steps.len();
        steps.retain(|s| s.id() != step_id);
        Ok(steps.len() != before)
    }

    async fn record_step_completion(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        _context: &EvaluationContext,
    ) -> Result<(), DomainError> {
        let mut store = self.store.write().await;
        store
            .completions
            .entry(workflow_id.as_str().to_string())
            .or_default()
            .insert(step_id.clone());
        Ok(())
    }
}
