//! Condition evaluation against an evaluation context

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::agent::{AgentJudge, JudgmentRequest};
use super::condition::Condition;
use super::context::EvaluationContext;
use super::entity::{AgentId, StepId};

/// Default timeout for a single judgment call
pub const DEFAULT_JUDGE_TIMEOUT_MS: u64 = 10_000;

/// Whole milliseconds in `duration`, capped at `u64::MAX`
pub(super) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A judgment that could not be obtained.
///
/// The condition counts as not satisfied, but the failure is recoverable:
/// the step may be retried on the next trigger.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionEvaluationError {
    #[error("Judgment by agent '{agent_id}' for step '{step_id}' failed: {message}")]
    JudgeFailed {
        step_id: StepId,
        agent_id: AgentId,
        message: String,
    },

    #[error("Judgment by agent '{agent_id}' for step '{step_id}' timed out after {timeout_ms}ms")]
    JudgeTimedOut {
        step_id: StepId,
        agent_id: AgentId,
        timeout_ms: u64,
    },
}

/// Result of evaluating one or more conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionOutcome {
    pub satisfied: bool,
    pub errors: Vec<ConditionEvaluationError>,
}

impl ConditionOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Evaluates condition trees, calling the judging agent for `AgentJudged`
/// nodes that have no verdict recorded in the context
#[derive(Clone)]
pub struct ConditionEvaluator {
    judge: Arc<dyn AgentJudge>,
    judge_timeout: Duration,
}

impl ConditionEvaluator {
    pub fn new(judge: Arc<dyn AgentJudge>) -> Self {
        Self {
            judge,
            judge_timeout: Duration::from_millis(DEFAULT_JUDGE_TIMEOUT_MS),
        }
    }

    pub fn with_judge_timeout(mut self, judge_timeout: Duration) -> Self {
        self.judge_timeout = judge_timeout;
        self
    }

    pub fn judge_timeout(&self) -> Duration {
        self.judge_timeout
    }

    /// Evaluate a single condition tree
    pub async fn evaluate(&self, condition: &Condition, context: &EvaluationContext) -> ConditionOutcome {
        let mut errors = Vec::new();
        let satisfied = self.evaluate_node(condition, context, &mut errors).await;
        ConditionOutcome { satisfied, errors }
    }

    /// Evaluate a step's condition list, which is implicitly AND-ed
    pub async fn evaluate_all(
        &self,
        conditions: &[Condition],
        context: &EvaluationContext,
    ) -> ConditionOutcome {
        let mut errors = Vec::new();
        let mut satisfied = true;

        for condition in conditions {
            if !self.evaluate_node(condition, context, &mut errors).await {
                satisfied = false;
                break;
            }
        }

        ConditionOutcome { satisfied, errors }
    }

    fn evaluate_node<'a>(
        &'a self,
        condition: &'a Condition,
        context: &'a EvaluationContext,
        errors: &'a mut Vec<ConditionEvaluationError>,
    ) -> BoxFuture<'a, bool> {
        async move {
            match condition {
                Condition::Always => true,
                Condition::StepRef { step_id } => context.is_step_completed(step_id),
                Condition::WorkflowRef { workflow_id } => context.is_workflow_completed(workflow_id),
                Condition::UiEvent { event } => context.has_event(*event),
                Condition::And { conditions } => {
                    for child in conditions {
                        if !self.evaluate_node(child, context, errors).await {
                            return false;
                        }
                    }
                    true
                }
                Condition::Or { conditions } => {
                    for child in conditions {
                        if self.evaluate_node(child, context, errors).await {
                            return true;
                        }
                    }
                    false
                }
                Condition::AgentJudged {
                    step_id,
                    agent_id,
                    prompt,
                } => {
                    if let Some(verdict) = context.judgment(step_id) {
                        debug!("Using recorded judgment for step '{}': {}", step_id, verdict);
                        return verdict;
                    }

                    let request = JudgmentRequest {
                        step_id: step_id.clone(),
                        agent_id: agent_id.clone(),
                        prompt: prompt.clone(),
                    };
                    match self.judge(&request, context).await {
                        Ok(verdict) => verdict,
                        Err(err) => {
                            errors.push(err);
                            false
                        }
                    }
                }
            }
        }
        .boxed()
    }

    async fn judge(
        &self,
        request: &JudgmentRequest,
        context: &EvaluationContext,
    ) -> Result<bool, ConditionEvaluationError> {
        match timeout(self.judge_timeout, self.judge.judge(request, context)).await {
            Ok(Ok(verdict)) => {
                debug!(
                    "Agent '{}' judged step '{}': {}",
                    request.agent_id, request.step_id, verdict
                );
                Ok(verdict)
            }
            Ok(Err(e)) => {
                warn!(
                    "Agent '{}' failed to judge step '{}': {}",
                    request.agent_id, request.step_id, e
                );
                Err(ConditionEvaluationError::JudgeFailed {
                    step_id: request.step_id.clone(),
                    agent_id: request.agent_id.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                let timeout_ms = saturating_millis(self.judge_timeout);
                warn!(
                    "Agent '{}' timed out judging step '{}' after {}ms",
                    request.agent_id, request.step_id, timeout_ms
                );
                Err(ConditionEvaluationError::JudgeTimedOut {
                    step_id: request.step_id.clone(),
                    agent_id: request.agent_id.clone(),
                    timeout_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::agent::MockAgentJudge;
    use crate::domain::workflow::condition::UiEvent;
    use crate::domain::DomainError;
    use async_trait::async_trait;

    fn step_id(id: &str) -> StepId {
        StepId::new(id).unwrap()
    }

    fn judged(step: &str) -> Condition {
        Condition::judged(step_id(step), AgentId::new("judge").unwrap(), "Ready?")
    }

    fn evaluator(judge: MockAgentJudge) -> ConditionEvaluator {
        ConditionEvaluator::new(Arc::new(judge))
    }

    #[derive(Debug)]
    struct SlowJudge {
        delay: Duration,
    }

    #[async_trait]
    impl AgentJudge for SlowJudge {
        async fn judge(
            &self,
            _request: &JudgmentRequest,
            _context: &EvaluationContext,
        ) -> Result<bool, DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_scalar_conditions_need_no_judge() {
        let evaluator = evaluator(MockAgentJudge::new());
        let ctx = EvaluationContext::new()
            .with_completed_step(step_id("a"))
            .with_event(UiEvent::OnClicked);

        assert!(evaluator.evaluate(&Condition::Always, &ctx).await.satisfied);
        assert!(evaluator.evaluate(&Condition::step(step_id("a")), &ctx).await.satisfied);
        assert!(!evaluator.evaluate(&Condition::step(step_id("b")), &ctx).await.satisfied);
        assert!(
            evaluator
                .evaluate(&Condition::ui_event(UiEvent::OnClicked), &ctx)
                .await
                .satisfied
        );
    }

    #[tokio::test]
    async fn test_positive_judgment() {
        let mut judge = MockAgentJudge::new();
        judge
            .expect_judge()
            .withf(|request, _| request.step_id.as_str() == "feedback" && request.prompt == "Ready?")
            .times(1)
            .returning(|_, _| Ok(true));

        let outcome = evaluator(judge)
            .evaluate(&judged("feedback"), &EvaluationContext::new())
            .await;

        assert!(outcome.satisfied);
        assert!(!outcome.has_errors());
    }

    #[tokio::test]
    async fn test_recorded_judgment_skips_the_judge() {
        // No expectation: calling the judge would panic
        let evaluator = evaluator(MockAgentJudge::new());

        let accepted = EvaluationContext::new().with_judgment(step_id("feedback"), true);
        assert!(evaluator.evaluate(&judged("feedback"), &accepted).await.satisfied);

        let rejected = EvaluationContext::new().with_judgment(step_id("feedback"), false);
        let outcome = evaluator.evaluate(&judged("feedback"), &rejected).await;
        assert!(!outcome.satisfied);
        assert!(!outcome.has_errors());
    }

    #[tokio::test]
    async fn test_judge_failure_is_false_with_error() {
        let mut judge = MockAgentJudge::new();
        judge
            .expect_judge()
            .returning(|_, _| Err(DomainError::provider("agent", "503")));

        let outcome = evaluator(judge)
            .evaluate(&judged("feedback"), &EvaluationContext::new())
            .await;

        assert!(!outcome.satisfied);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            ConditionEvaluationError::JudgeFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_judge_timeout_is_false_with_error() {
        let evaluator = ConditionEvaluator::new(Arc::new(SlowJudge {
            delay: Duration::from_millis(500),
        }))
        .with_judge_timeout(Duration::from_millis(20));

        let outcome = evaluator
            .evaluate(&judged("feedback"), &EvaluationContext::new())
            .await;

        assert!(!outcome.satisfied);
        assert_eq!(
            outcome.errors,
            vec![ConditionEvaluationError::JudgeTimedOut {
                step_id: step_id("feedback"),
                agent_id: AgentId::new("judge").unwrap(),
                timeout_ms: 20,
            }]
        );
    }

    #[tokio::test]
    async fn test_and_short_circuits_before_judge() {
        // No expectation: calling the judge would panic
        let evaluator = evaluator(MockAgentJudge::new());
        let condition = Condition::and(vec![Condition::step(step_id("missing")), judged("x")]);

        let outcome = evaluator.evaluate(&condition, &EvaluationContext::new()).await;
        assert!(!outcome.satisfied);
        assert!(!outcome.has_errors());
    }

    #[tokio::test]
    async fn test_or_short_circuits_before_judge() {
        let evaluator = evaluator(MockAgentJudge::new());
        let condition = Condition::or(vec![Condition::Always, judged("x")]);

        let outcome = evaluator.evaluate(&condition, &EvaluationContext::new()).await;
        assert!(outcome.satisfied);
    }

    #[tokio::test]
    async fn test_or_recovers_from_failed_judgment() {
        let mut judge = MockAgentJudge::new();
        judge
            .expect_judge()
            .times(1)
            .returning(|_, _| Err(DomainError::provider("agent", "down")));

        let ctx = EvaluationContext::new().with_completed_step(step_id("a"));
        let condition = Condition::or(vec![judged("x"), Condition::step(step_id("a"))]);

        let outcome = evaluator(judge).evaluate(&condition, &ctx).await;
        assert!(outcome.satisfied);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_all_is_implicit_and() {
        let evaluator = evaluator(MockAgentJudge::new());
        let ctx = EvaluationContext::new().with_completed_step(step_id("a"));

        let both = [Condition::step(step_id("a")), Condition::Always];
        assert!(evaluator.evaluate_all(&both, &ctx).await.satisfied);

        let one_missing = [
            Condition::step(step_id("a")),
            Condition::step(step_id("b")),
            judged("never-called"),
        ];
        assert!(!evaluator.evaluate_all(&one_missing, &ctx).await.satisfied);
    }

    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_millis(20)), 20);
        assert_eq!(saturating_millis(Duration::from_micros(1_500)), 1);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }
}
