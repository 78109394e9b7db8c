//! Step actions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::AgentId;

/// The effect produced when a step fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Terminal: a literal reply
    Text(TextAction),

    /// Non-terminal: delegates to an agent, which yields a further action
    Agent(AgentAction),
}

impl Action {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextAction::new(text))
    }

    pub fn agent(action: AgentAction) -> Self {
        Self::Agent(action)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn as_text(&self) -> Option<&TextAction> {
        match self {
            Self::Text(text) => Some(text),
            Self::Agent(_) => None,
        }
    }

    /// Number of agent delegations declared along the `return` chain
    pub fn declared_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Self::Agent(agent) = current {
            depth += 1;
            current = &agent.return_action;
        }
        depth
    }
}

/// A terminal text reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAction {
    pub text: String,
}

impl TextAction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// An action performed by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub agent_id: AgentId,

    /// Example: "gpt-4o"
    pub model: String,

    pub prompt: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,

    /// Declared continuation, used when the agent yields nothing usable
    #[serde(rename = "return")]
    pub return_action: Box<Action>,
}

impl AgentAction {
    pub fn new(
        agent_id: AgentId,
        model: impl Into<String>,
        prompt: impl Into<String>,
        return_action: Action,
    ) -> Self {
        Self {
            agent_id,
            model: model.into(),
            prompt: prompt.into(),
            args: Value::Null,
            return_action: Box::new(return_action),
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}
