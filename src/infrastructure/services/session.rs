//! Per-instance workflow session reacting to triggers

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::step_engine_service::StepEngineService;
use crate::domain::workflow::DependencyIndex;
use crate::domain::{
    EvaluationContext, PassOutcome, Step, StepId, UiEvent, Workflow, WorkflowError, WorkflowId,
};

#[derive(Debug)]
struct SessionWorkflow {
    workflow: Workflow,
    steps: Vec<Step>,
    index: DependencyIndex,
}

/// Passes run in reaction to one trigger, keyed by workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerOutcome {
    pub passes: BTreeMap<WorkflowId, PassOutcome>,
}

impl TriggerOutcome {
    /// No step was gated by the trigger, so no pass ran
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass(&self, workflow_id: &WorkflowId) -> Option<&PassOutcome> {
        self.passes.get(workflow_id)
    }

    pub fn completed_step_ids(&self) -> Vec<&StepId> {
        self.passes
            .values()
            .flat_map(|pass| pass.completed_step_ids.iter())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.passes.values().any(PassOutcome::has_errors)
    }
}

/// One end-user's progress through one or more workflows.
///
/// The session owns its evaluation context. A trigger updates the context
/// and runs a pass over every workflow with a step gated by it. Steps those
/// passes complete are fanned out to the session's other workflows; each
/// workflow runs at most once per trigger.
#[derive(Debug)]
pub struct WorkflowSession {
    service: Arc<StepEngineService>,
    workflows: Vec<SessionWorkflow>,
    context: EvaluationContext,
}

impl WorkflowSession {
    /// Load the workflows and run the initial pass over each of them
    pub async fn start(
        service: Arc<StepEngineService>,
        workflow_ids: &[&str],
        mut context: EvaluationContext,
    ) -> Result<(Self, TriggerOutcome), WorkflowError> {
        let mut workflows: Vec<SessionWorkflow> = Vec::with_capacity(workflow_ids.len());

        for workflow_id in workflow_ids {
            let (workflow, steps) = service.load(workflow_id).await?;
            if workflows.iter().any(|w| w.workflow.id() == workflow.id()) {
                return Err(WorkflowError::validation(format!(
                    "Workflow '{}' is listed twice in the session",
                    workflow.id()
                )));
            }

            let index = DependencyIndex::build(&workflow, &steps);
            workflows.push(SessionWorkflow {
                workflow,
                steps,
                index,
            });
        }

        service.register_known_references(&mut context).await?;

        let mut session = Self {
            service,
            workflows,
            context,
        };
        let outcome = session.run_pass().await?;
        Ok((session, outcome))
    }

    /// Start a session over every active workflow in the repository
    pub async fn start_all(
        service: Arc<StepEngineService>,
        context: EvaluationContext,
    ) -> Result<(Self, TriggerOutcome), WorkflowError> {
        let active = service.repository().list_active().await?;
        let mut ids: Vec<String> = active.iter().map(|w| w.id().to_string()).collect();
        ids.sort();

        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::start(service, &ids, context).await
    }

    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.iter().map(|w| &w.workflow)
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn into_context(self) -> EvaluationContext {
        self.context
    }

    pub fn dependency_index(&self, workflow_id: &WorkflowId) -> Option<&DependencyIndex> {
        self.workflows
            .iter()
            .find(|w| w.workflow.id() == workflow_id)
            .map(|w| &w.index)
    }

    /// Run a pass over every workflow regardless of triggers
    pub async fn run_pass(&mut self) -> Result<TriggerOutcome, WorkflowError> {
        let all = (0..self.workflows.len()).collect();
        self.run_gated(all).await
    }

    /// Record a UI event
    pub async fn trigger_ui_event(&mut self, event: UiEvent) -> Result<TriggerOutcome, WorkflowError> {
        self.context.record_event(event);

        let gated = self.gated(|index| index.gated_by_event(event));
        if gated.is_empty() {
            debug!("No step in the session is gated by '{}'", event);
        }

        self.run_gated(gated).await
    }

    /// Record a step completion reported from outside the session
    pub async fn mark_step_completed(&mut self, step_id: StepId) -> Result<TriggerOutcome, WorkflowError> {
        let gated = self.gated(|index| index.dependents_of_step(&step_id));
        self.context.mark_step_completed(step_id);
        self.run_gated(gated).await
    }

    /// Record that a workflow completed
    pub async fn mark_workflow_completed(
        &mut self,
        workflow_id: WorkflowId,
    ) -> Result<TriggerOutcome, WorkflowError> {
        let gated = self.gated(|index| index.dependents_of_workflow(&workflow_id));
        self.context.mark_workflow_completed(workflow_id);
        self.run_gated(gated).await
    }

    /// Record a verdict delivered by an agent for a judged step
    pub async fn handle_agent_judgment(
        &mut self,
        step_id: StepId,
        accepted: bool,
    ) -> Result<TriggerOutcome, WorkflowError> {
        let gated = self.gated(|index| index.judged_on(&step_id));
        debug!("Recording judgment for step '{}': {}", step_id, accepted);
        self.context.record_judgment(step_id, accepted);
        self.run_gated(gated).await
    }

    fn gated<'a, F>(&'a self, lookup: F) -> VecDeque<usize>
    where
        F: Fn(&'a DependencyIndex) -> Option<&'a BTreeSet<StepId>>,
    {
        self.workflows
            .iter()
            .enumerate()
            .filter_map(|(position, w)| {
                lookup(&w.index)
                    .is_some_and(|steps| !steps.is_empty())
                    .then_some(position)
            })
            .collect()
    }

    async fn run_gated(&mut self, mut queue: VecDeque<usize>) -> Result<TriggerOutcome, WorkflowError> {
        let mut outcome = TriggerOutcome::default();
        let mut ran = BTreeSet::new();

        while let Some(position) = queue.pop_front() {
            if !ran.insert(position) {
                continue;
            }

            let member = &self.workflows[position];
            let pass = self
                .service
                .run_loaded(&member.workflow, &member.steps, &mut self.context)
                .await?;

            for step_id in &pass.completed_step_ids {
                for (other, candidate) in self.workflows.iter().enumerate() {
                    let waiting = candidate
                        .index
                        .dependents_of_step(step_id)
                        .is_some_and(|steps| !steps.is_empty());
                    if waiting && !ran.contains(&other) && !queue.contains(&other) {
                        debug!(
                            "Step '{}' completion reaches workflow '{}'",
                            step_id,
                            candidate.workflow.id()
                        );
                        queue.push_back(other);
                    }
                }
            }

            outcome.passes.insert(member.workflow.id().clone(), pass);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::repository::mock::MockWorkflowRepository;
    use crate::domain::workflow::{starter_workflow, MockAgentInvoker, MockAgentJudge};
    use crate::domain::{
        Action, ActionResolver, AgentId, Condition, ConditionEvaluator, StepScheduler, StepState,
    };
    use crate::infrastructure::agent::OfflineAgentClient;

    fn id(s: &str) -> StepId {
        StepId::new(s).unwrap()
    }

    fn wf(s: &str) -> WorkflowId {
        WorkflowId::new(s).unwrap()
    }

    fn service_with(repository: MockWorkflowRepository, scheduler: StepScheduler) -> Arc<StepEngineService> {
        Arc::new(StepEngineService::new(Arc::new(repository), scheduler))
    }

    fn offline_service(repository: MockWorkflowRepository) -> Arc<StepEngineService> {
        let agent = Arc::new(OfflineAgentClient::new());
        service_with(
            repository,
            StepScheduler::new(ConditionEvaluator::new(agent.clone()), ActionResolver::new(agent)),
        )
    }

    fn single_step(workflow: &str, step: &str, condition: Condition) -> (Workflow, Vec<Step>) {
        (
            Workflow::new(wf(workflow), workflow),
            vec![Step::new(id(step), wf(workflow), step)
                .with_condition(condition)
                .with_action(Action::text(format!("{} reply", step)))],
        )
    }

    /// "kyc" verifies on click; "rewards" waits for the verification
    fn kyc_and_rewards() -> MockWorkflowRepository {
        let (kyc, kyc_steps) = single_step("kyc", "verify", Condition::ui_event(UiEvent::OnClicked));
        let (rewards, rewards_steps) = single_step("rewards", "claim", Condition::step(id("verify")));

        MockWorkflowRepository::new()
            .with_workflow(kyc, kyc_steps)
            .with_workflow(rewards, rewards_steps)
    }

    #[tokio::test]
    async fn test_start_fires_initial_steps() {
        let (workflow, steps) = starter_workflow().unwrap();
        let service = offline_service(MockWorkflowRepository::new().with_workflow(workflow, steps));

        let (session, outcome) =
            WorkflowSession::start(service, &["defi-onboarding"], EvaluationContext::new())
                .await
                .unwrap();

        let pass = outcome.pass(&wf("defi-onboarding")).unwrap();
        assert!(pass.is_completed(&id("welcome")));
        assert!(session.context().is_step_completed(&id("connect-wallet")));
    }

    #[tokio::test]
    async fn test_click_triggers_gated_step() {
        let (workflow, steps) = starter_workflow().unwrap();
        let service = offline_service(MockWorkflowRepository::new().with_workflow(workflow, steps));

        let (mut session, _) =
            WorkflowSession::start(service, &["defi-onboarding"], EvaluationContext::new())
                .await
                .unwrap();

        let outcome = session.trigger_ui_event(UiEvent::OnClicked).await.unwrap();
        assert_eq!(outcome.completed_step_ids(), vec![&id("offer-yield")]);
    }

    #[tokio::test]
    async fn test_unrelated_event_runs_no_pass() {
        let (workflow, steps) = starter_workflow().unwrap();

        // Any agent call would panic
        let scheduler = StepScheduler::new(
            ConditionEvaluator::new(Arc::new(MockAgentJudge::new())),
            ActionResolver::new(Arc::new(MockAgentInvoker::new())),
        );
        let ctx = ["welcome", "connect-wallet", "request-feedback"]
            .into_iter()
            .fold(EvaluationContext::new(), |ctx, s| ctx.with_completed_step(id(s)));
        let service = service_with(
            MockWorkflowRepository::new().with_workflow(workflow, steps),
            scheduler,
        );

        let (mut session, initial) = WorkflowSession::start(service, &["defi-onboarding"], ctx)
            .await
            .unwrap();
        assert_eq!(
            initial.pass(&wf("defi-onboarding")).unwrap().state_of(&id("offer-yield")),
            Some(StepState::Pending)
        );

        assert!(session.trigger_ui_event(UiEvent::OnHovered).await.unwrap().is_empty());
        assert!(session.context().has_event(UiEvent::OnHovered));
    }

    #[tokio::test]
    async fn test_workflow_completion_triggers_dependents() {
        let (rewards, steps) = single_step("rewards", "claim", Condition::workflow(wf("kyc")));
        let service = offline_service(
            MockWorkflowRepository::new()
                .with_workflow(rewards, steps)
                .with_workflow(Workflow::new(wf("kyc"), "KYC"), Vec::new()),
        );

        let (mut session, initial) =
            WorkflowSession::start(service, &["rewards"], EvaluationContext::new())
                .await
                .unwrap();
        assert!(initial.completed_step_ids().is_empty());
        assert!(!initial.has_errors());

        let unrelated = session.mark_workflow_completed(wf("other")).await.unwrap();
        assert!(unrelated.is_empty());

        let outcome = session.mark_workflow_completed(wf("kyc")).await.unwrap();
        assert_eq!(outcome.completed_step_ids(), vec![&id("claim")]);
    }

    #[tokio::test]
    async fn test_completion_fans_out_to_other_workflows() {
        let service = offline_service(kyc_and_rewards());

        let (mut session, initial) =
            WorkflowSession::start(service, &["rewards", "kyc"], EvaluationContext::new())
                .await
                .unwrap();
        assert!(initial.completed_step_ids().is_empty());
        assert!(!initial.has_errors());

        let outcome = session.trigger_ui_event(UiEvent::OnClicked).await.unwrap();
        assert!(outcome.pass(&wf("kyc")).unwrap().is_completed(&id("verify")));
        assert!(outcome.pass(&wf("rewards")).unwrap().is_completed(&id("claim")));
        assert!(session.context().is_step_completed(&id("claim")));
    }

    #[tokio::test]
    async fn test_external_step_completion() {
        let service = offline_service(kyc_and_rewards());

        let (mut session, _) = WorkflowSession::start(service, &["rewards"], EvaluationContext::new())
            .await
            .unwrap();

        assert!(session.mark_step_completed(id("welcome")).await.unwrap().is_empty());

        let outcome = session.mark_step_completed(id("verify")).await.unwrap();
        assert_eq!(outcome.completed_step_ids(), vec![&id("claim")]);
    }

    #[tokio::test]
    async fn test_agent_judgment_fires_judged_step() {
        let judged = Condition::judged(id("feedback"), AgentId::new("support").unwrap(), "Ask now?");
        let (workflow, steps) = single_step("survey", "feedback", judged);
        let service = offline_service(MockWorkflowRepository::new().with_workflow(workflow, steps));

        // The offline judge rejects, so only a delivered verdict can fire the step
        let (mut session, initial) =
            WorkflowSession::start(service, &["survey"], EvaluationContext::new())
                .await
                .unwrap();
        assert!(initial.completed_step_ids().is_empty());

        assert!(session.handle_agent_judgment(id("other"), true).await.unwrap().is_empty());

        let outcome = session.handle_agent_judgment(id("feedback"), true).await.unwrap();
        assert_eq!(outcome.completed_step_ids(), vec![&id("feedback")]);
        assert_eq!(session.context().judgment(&id("feedback")), Some(true));
    }

    #[tokio::test]
    async fn test_start_all_covers_active_workflows() {
        let service = offline_service(kyc_and_rewards());

        let (session, _) = WorkflowSession::start_all(service, EvaluationContext::new())
            .await
            .unwrap();

        let ids: Vec<&str> = session.workflows().map(|w| w.id().as_str()).collect();
        assert_eq!(ids, vec!["kyc", "rewards"]);
        assert!(session.dependency_index(&wf("rewards")).is_some());
    }

    #[tokio::test]
    async fn test_duplicate_workflow_is_rejected() {
        let service = offline_service(kyc_and_rewards());

        let result = WorkflowSession::start(service, &["kyc", "kyc"], EvaluationContext::new()).await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }
}
