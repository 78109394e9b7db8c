use async_trait::async_trait;
use tracing::debug;

use crate::domain::{
    Action, AgentInvocation, AgentInvoker, AgentJudge, DomainError, EvaluationContext,
    JudgmentRequest,
};

/// Stand-in used when no agent service is configured.
///
/// Every delegation is declined, so declared `return` actions are used, and
/// every judgment is negative.
#[derive(Debug, Clone, Default)]
pub struct OfflineAgentClient;

impl OfflineAgentClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentInvoker for OfflineAgentClient {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<Option<Action>, DomainError> {
        debug!("Agent '{}' is offline; declining", invocation.agent_id);
        Ok(None)
    }
}

#[async_trait]
impl AgentJudge for OfflineAgentClient {
    async fn judge(
        &self,
        request: &JudgmentRequest,
        _context: &EvaluationContext,
    ) -> Result<bool, DomainError> {
        debug!(
            "Agent '{}' is offline; step '{}' judged not ready",
            request.agent_id, request.step_id
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentAction, AgentId, StepId};

    #[test]
    fn test_offline_declines_and_rejects() {
        let client = OfflineAgentClient::new();
        let agent_id = AgentId::new("support").unwrap();

        let invocation = AgentInvocation::from_action(
            &AgentAction::new(agent_id.clone(), "gpt-4o", "hi", Action::text("bye")),
            false,
        );
        let request = JudgmentRequest {
            step_id: StepId::new("feedback").unwrap(),
            agent_id,
            prompt: "now?".to_string(),
        };

        let action = tokio_test::block_on(client.invoke(&invocation)).unwrap();
        assert!(action.is_none());

        let verdict =
            tokio_test::block_on(client.judge(&request, &EvaluationContext::new())).unwrap();
        assert!(!verdict);
    }
}
