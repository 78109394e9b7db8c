//! Agent collaborator contracts consumed by the engine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Action, AgentAction};
use super::context::EvaluationContext;
use super::entity::{AgentId, StepId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Request sent to the agent when an `AgentAction` is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInvocation {
    pub agent_id: AgentId,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub args: Value,
    /// Opaque compute tier hint taken from the firing step
    #[serde(default)]
    pub beast_mode: bool,
}

impl AgentInvocation {
    pub fn from_action(action: &AgentAction, beast_mode: bool) -> Self {
        Self {
            agent_id: action.agent_id.clone(),
            model: action.model.clone(),
            prompt: action.prompt.clone(),
            args: action.args.clone(),
            beast_mode,
        }
    }
}

/// Request sent to the agent when an `AgentJudged` condition is evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentRequest {
    pub step_id: StepId,
    pub agent_id: AgentId,
    pub prompt: String,
}

/// Invokes an agent on behalf of an `AgentAction`.
///
/// `Ok(None)` means the agent answered but produced nothing usable; the
/// resolver then falls back to the action's declared `return`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<Option<Action>, DomainError>;
}

/// Judges whether an `AgentJudged` condition holds
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentJudge: Send + Sync {
    async fn judge(
        &self,
        request: &JudgmentRequest,
        context: &EvaluationContext,
    ) -> Result<bool, DomainError>;
}
