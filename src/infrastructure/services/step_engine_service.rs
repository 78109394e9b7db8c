//! Step engine service - loads workflows and runs scheduling passes

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::domain::{
    EvaluationContext, PassOutcome, Step, StepScheduler, Workflow, WorkflowError, WorkflowId,
    WorkflowRepository,
};
use crate::infrastructure::observability::record_pass;

/// Runs passes against workflows held in a repository
pub struct StepEngineService {
    repository: Arc<dyn WorkflowRepository>,
    scheduler: StepScheduler,
}

impl std::fmt::Debug for StepEngineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEngineService")
            .field("repository", &self.repository)
            .field("ordering", &self.scheduler.ordering())
            .finish()
    }
}

impl StepEngineService {
    pub fn new(repository: Arc<dyn WorkflowRepository>, scheduler: StepScheduler) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub fn repository(&self) -> &Arc<dyn WorkflowRepository> {
        &self.repository
    }

    /// Load a workflow and its steps
    pub async fn load(&self, workflow_id: &str) -> Result<(Workflow, Vec<Step>), WorkflowError> {
        let id = WorkflowId::new(workflow_id)?;

        let workflow = self
            .repository
            .get(&id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(id.as_str()))?;

        let steps = self.repository.load_steps(&id).await?;
        Ok((workflow, steps))
    }

    /// Register every workflow and step in the repository as a valid
    /// reference target
    pub async fn register_known_references(
        &self,
        context: &mut EvaluationContext,
    ) -> Result<(), WorkflowError> {
        for workflow in self.repository.list().await? {
            for step in self.repository.load_steps(workflow.id()).await? {
                context.register_step(step.id().clone());
            }
            context.register_workflow(workflow.id().clone());
        }
        Ok(())
    }

    /// Load a workflow and run one pass over it
    pub async fn run_pass(
        &self,
        workflow_id: &str,
        context: &mut EvaluationContext,
    ) -> Result<PassOutcome, WorkflowError> {
        let (workflow, steps) = self.load(workflow_id).await?;
        self.register_known_references(context).await?;
        self.run_loaded(&workflow, &steps, context).await
    }

    /// Run one pass over an already loaded workflow and persist completions
    pub async fn run_loaded(
        &self,
        workflow: &Workflow,
        steps: &[Step],
        context: &mut EvaluationContext,
    ) -> Result<PassOutcome, WorkflowError> {
        let started = Instant::now();
        let outcome = self.scheduler.run_pass(workflow, steps, context).await?;
        record_pass(workflow.id(), &outcome, started.elapsed());

        for step_id in &outcome.completed_step_ids {
            if let Err(e) = self
                .repository
                .record_step_completion(workflow.id(), step_id, context)
                .await
            {
                warn!(
                    workflow_id = %workflow.id(),
                    step_id = %step_id,
                    "Failed to record step completion: {}", e
                );
            }
        }

        info!(
            workflow_id = %workflow.id(),
            completed = outcome.completed_step_ids.len(),
            errors = outcome.errors.len(),
            "Pass finished"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::repository::mock::MockWorkflowRepository;
    use crate::domain::workflow::starter_workflow;
    use crate::domain::{
        Action, ActionResolver, Condition, ConditionEvaluator, StepId, StepState, TextAction,
        UiEvent,
    };
    use crate::infrastructure::agent::OfflineAgentClient;

    fn scheduler() -> StepScheduler {
        let agent = Arc::new(OfflineAgentClient::new());
        StepScheduler::new(ConditionEvaluator::new(agent.clone()), ActionResolver::new(agent))
    }

    fn service(repository: MockWorkflowRepository) -> (Arc<MockWorkflowRepository>, StepEngineService) {
        let repository = Arc::new(repository);
        let service = StepEngineService::new(repository.clone(), scheduler());
        (repository, service)
    }

    fn starter_repository() -> MockWorkflowRepository {
        let (workflow, steps) = starter_workflow().unwrap();
        MockWorkflowRepository::new().with_workflow(workflow, steps)
    }

    fn id(s: &str) -> StepId {
        StepId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_run_pass_over_starter_workflow() {
        let (repository, service) = service(starter_repository());
        let mut ctx = EvaluationContext::new();

        let outcome = service.run_pass("defi-onboarding", &mut ctx).await.unwrap();

        assert_eq!(
            outcome.completed_step_ids,
            vec![id("welcome"), id("connect-wallet"), id("request-feedback")]
        );
        assert_eq!(outcome.state_of(&id("offer-yield")), Some(StepState::Pending));
        // Offline agent declines, so the declared return is used
        assert_eq!(
            outcome.terminal_actions[&id("request-feedback")],
            vec![TextAction::new("Thank you for helping us improve!")]
        );
        assert_eq!(repository.completions().len(), 3);
    }

    #[tokio::test]
    async fn test_click_fires_offer_on_next_pass() {
        let (_, service) = service(starter_repository());
        let mut ctx = EvaluationContext::new();

        service.run_pass("defi-onboarding", &mut ctx).await.unwrap();
        ctx.record_event(UiEvent::OnClicked);
        let outcome = service.run_pass("defi-onboarding", &mut ctx).await.unwrap();

        assert_eq!(outcome.completed_step_ids, vec![id("offer-yield")]);
        assert_eq!(outcome.state_of(&id("welcome")), Some(StepState::Skipped));
    }

    #[tokio::test]
    async fn test_step_ref_into_another_repository_workflow() {
        let kyc = WorkflowId::new("kyc").unwrap();
        let rewards = WorkflowId::new("rewards").unwrap();
        let repository = MockWorkflowRepository::new()
            .with_workflow(
                Workflow::new(kyc.clone(), "KYC"),
                vec![Step::new(id("kyc-verified"), kyc, "Verified")
                    .with_condition(Condition::ui_event(UiEvent::OnClicked))
                    .with_action(Action::text("Verified"))],
            )
            .with_workflow(
                Workflow::new(rewards.clone(), "Rewards"),
                vec![Step::new(id("claim"), rewards, "Claim")
                    .with_condition(Condition::step(id("kyc-verified")))
                    .with_action(Action::text("Claim your reward"))],
            );
        let (_, service) = service(repository);
        let mut ctx = EvaluationContext::new();

        let first = service.run_pass("rewards", &mut ctx).await.unwrap();
        assert!(!first.has_errors());
        assert_eq!(first.state_of(&id("claim")), Some(StepState::Pending));
        assert!(ctx.is_known_step(&id("kyc-verified")));

        ctx.mark_step_completed(id("kyc-verified"));
        let second = service.run_pass("rewards", &mut ctx).await.unwrap();
        assert_eq!(second.completed_step_ids, vec![id("claim")]);
    }

    #[tokio::test]
    async fn test_unknown_workflow() {
        let (_, service) = service(MockWorkflowRepository::new());
        let result = service.run_pass("missing", &mut EvaluationContext::new()).await;
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_workflow_id() {
        let (_, service) = service(MockWorkflowRepository::new());
        let result = service.run_pass("not valid!", &mut EvaluationContext::new()).await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let (_, service) = service(starter_repository().with_error("disk on fire"));
        let result = service
            .run_pass("defi-onboarding", &mut EvaluationContext::new())
            .await;

        match result {
            Err(WorkflowError::LoadFailed(message)) => assert!(message.contains("disk on fire")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completion_recording_failure_does_not_fail_pass() {
        let (repository, service) = service(starter_repository().with_failing_completions());
        let mut ctx = EvaluationContext::new();

        let outcome = service.run_pass("defi-onboarding", &mut ctx).await.unwrap();

        assert_eq!(outcome.completed_step_ids.len(), 3);
        assert!(repository.completions().is_empty());
        assert!(ctx.is_step_completed(&id("welcome")));
    }
}
