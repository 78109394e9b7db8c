//! Action resolution: unwraps agent delegations until a terminal text action

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::action::{Action, AgentAction, TextAction};
use super::agent::{AgentInvocation, AgentInvoker};
use super::entity::AgentId;
use super::evaluator::saturating_millis;

/// Default maximum number of agent delegations per resolution
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 8;

/// Default timeout for a single agent invocation
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30_000;

/// What happened at one agent delegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HopOutcome {
    /// The agent returned a new action
    Delegated,
    /// The agent answered with nothing usable; the declared return was used
    Declined,
    /// The agent failed or timed out; the declared return was used
    Unreachable { message: String },
}

/// One agent delegation in a resolution chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionHop {
    pub agent_id: AgentId,
    pub model: String,
    #[serde(flatten)]
    pub outcome: HopOutcome,
}

/// Successful resolution of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub action: TextAction,
    pub chain: Vec<ResolutionHop>,
}

impl Resolution {
    /// Whether any hop fell back to a declared return
    pub fn used_fallback(&self) -> bool {
        self.chain
            .iter()
            .any(|hop| !matches!(hop.outcome, HopOutcome::Delegated))
    }

    /// Whether any agent in the chain could not be reached
    pub fn had_unreachable_agent(&self) -> bool {
        self.chain
            .iter()
            .any(|hop| matches!(hop.outcome, HopOutcome::Unreachable { .. }))
    }
}

/// Why a resolution could not reach a terminal action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    DepthExceeded { max_depth: usize },
    CycleDetected { agent_id: AgentId },
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthExceeded { max_depth } => {
                write!(f, "exceeded maximum depth of {} agent delegations", max_depth)
            }
            Self::CycleDetected { agent_id } => {
                write!(f, "agent '{}' re-issued an action already in the chain", agent_id)
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum ResolutionError {
    #[error("Action resolution failed after {} hop(s): {reason}", .chain.len())]
    ResolutionFailed {
        reason: ResolutionFailure,
        chain: Vec<ResolutionHop>,
    },
}

impl ResolutionError {
    pub fn chain(&self) -> &[ResolutionHop] {
        match self {
            Self::ResolutionFailed { chain, .. } => chain,
        }
    }

    pub fn reason(&self) -> &ResolutionFailure {
        match self {
            Self::ResolutionFailed { reason, .. } => reason,
        }
    }
}

/// Resolves actions through the agent invocation collaborator
#[derive(Clone)]
pub struct ActionResolver {
    invoker: Arc<dyn AgentInvoker>,
    max_depth: usize,
    agent_timeout: Duration,
}

impl ActionResolver {
    pub fn new(invoker: Arc<dyn AgentInvoker>) -> Self {
        Self {
            invoker,
            max_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            agent_timeout: Duration::from_millis(DEFAULT_AGENT_TIMEOUT_MS),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_agent_timeout(mut self, agent_timeout: Duration) -> Self {
        self.agent_timeout = agent_timeout;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve an action to a terminal text action.
    ///
    /// Text actions are returned unchanged without calling the agent. Each
    /// agent delegation either yields the agent's action or, when the agent
    /// declines or fails, the action's declared `return`.
    pub async fn resolve(
        &self,
        action: &Action,
        beast_mode: bool,
    ) -> Result<Resolution, ResolutionError> {
        let mut chain = Vec::new();
        let mut visited: Vec<AgentAction> = Vec::new();

        let mut current = match action {
            Action::Text(text) => {
                return Ok(Resolution {
                    action: text.clone(),
                    chain,
                });
            }
            Action::Agent(agent) => agent.clone(),
        };

        loop {
            if visited.contains(&current) {
                return Err(ResolutionError::ResolutionFailed {
                    reason: ResolutionFailure::CycleDetected {
                        agent_id: current.agent_id.clone(),
                    },
                    chain,
                });
            }

            if chain.len() >= self.max_depth {
                return Err(ResolutionError::ResolutionFailed {
                    reason: ResolutionFailure::DepthExceeded {
                        max_depth: self.max_depth,
                    },
                    chain,
                });
            }

            let (outcome, next) = self.delegate(&current, beast_mode).await;
            chain.push(ResolutionHop {
                agent_id: current.agent_id.clone(),
                model: current.model.clone(),
                outcome,
            });

            match next {
                Action::Text(text) => {
                    debug!("Resolved action after {} agent hop(s)", chain.len());
                    return Ok(Resolution {
                        action: text,
                        chain,
                    });
                }
                Action::Agent(agent) => {
                    visited.push(std::mem::replace(&mut current, agent));
                }
            }
        }
    }

    async fn delegate(&self, action: &AgentAction, beast_mode: bool) -> (HopOutcome, Action) {
        let invocation = AgentInvocation::from_action(action, beast_mode);
        let fallback = || action.return_action.as_ref().clone();

        match timeout(self.agent_timeout, self.invoker.invoke(&invocation)).await {
            Ok(Ok(Some(next))) => (HopOutcome::Delegated, next),
            Ok(Ok(None)) => {
                debug!(
                    "Agent '{}' declined; using declared return action",
                    action.agent_id
                );
                (HopOutcome::Declined, fallback())
            }
            Ok(Err(e)) => {
                warn!(
                    "Agent '{}' invocation failed, using declared return action: {}",
                    action.agent_id, e
                );
                (
                    HopOutcome::Unreachable {
                        message: e.to_string(),
                    },
                    fallback(),
                )
            }
            Err(_) => {
                let timeout_ms = saturating_millis(self.agent_timeout);
                warn!(
                    "Agent '{}' timed out after {}ms, using declared return action",
                    action.agent_id, timeout_ms
                );
                (
                    HopOutcome::Unreachable {
                        message: format!("timed out after {}ms", timeout_ms),
                    },
                    fallback(),
                )
            }
        }
    }
}
