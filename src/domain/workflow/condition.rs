//! Step trigger conditions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::context::EvaluationContext;
use super::entity::{AgentId, StepId, WorkflowId};
use super::error::WorkflowError;

/// External UI events that can gate a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiEvent {
    OnPageLoad,
    OnVisited,
    OnClicked,
    OnHovered,
}

impl UiEvent {
    pub const ALL: [UiEvent; 4] = [
        UiEvent::OnPageLoad,
        UiEvent::OnVisited,
        UiEvent::OnClicked,
        UiEvent::OnHovered,
    ];

    /// Wire name of the event (`onPageLoad`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnPageLoad => "onPageLoad",
            Self::OnVisited => "onVisited",
            Self::OnClicked => "onClicked",
            Self::OnHovered => "onHovered",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::OnPageLoad => "On Page Load",
            Self::OnVisited => "On Visited",
            Self::OnClicked => "On Clicked",
            Self::OnHovered => "On Hovered",
        }
    }
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiEvent {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UiEvent::ALL
            .into_iter()
            .find(|event| event.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| WorkflowError::invalid_input(format!("Unknown UI event '{}'", s)))
    }
}

/// A boolean gate controlling whether a step fires.
///
/// Conditions are immutable value trees. They reference steps and workflows
/// by identity only and never own them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Unconditionally true
    Always,

    /// True once the referenced step has completed
    StepRef { step_id: StepId },

    /// True once the referenced workflow has completed
    WorkflowRef { workflow_id: WorkflowId },

    /// True once the event has been observed
    UiEvent { event: UiEvent },

    /// True iff all children are true
    And { conditions: Vec<Condition> },

    /// True iff any child is true
    Or { conditions: Vec<Condition> },

    /// True iff the judging agent returns a positive verdict
    AgentJudged {
        step_id: StepId,
        agent_id: AgentId,
        prompt: String,
    },
}

impl Condition {
    pub fn step(step_id: StepId) -> Self {
        Self::StepRef { step_id }
    }

    pub fn workflow(workflow_id: WorkflowId) -> Self {
        Self::WorkflowRef { workflow_id }
    }

    pub fn ui_event(event: UiEvent) -> Self {
        Self::UiEvent { event }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::And { conditions }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::Or { conditions }
    }

    pub fn judged(step_id: StepId, agent_id: AgentId, prompt: impl Into<String>) -> Self {
        Self::AgentJudged {
            step_id,
            agent_id,
            prompt: prompt.into(),
        }
    }

    /// Human-readable label used for dependency edges and listings
    pub fn description(&self) -> &'static str {
        match self {
            Self::Always => "Always",
            Self::StepRef { .. } => "After Step",
            Self::WorkflowRef { .. } => "After Workflow",
            Self::UiEvent { event } => event.description(),
            Self::And { .. } => "All Conditions",
            Self::Or { .. } => "Any Condition",
            Self::AgentJudged { .. } => "Judged by Agent",
        }
    }

    /// Whether evaluating this tree may require calling the judging agent
    pub fn requires_judgment(&self) -> bool {
        match self {
            Self::AgentJudged { .. } => true,
            Self::And { conditions } | Self::Or { conditions } => {
                conditions.iter().any(Condition::requires_judgment)
            }
            Self::Always | Self::StepRef { .. } | Self::WorkflowRef { .. } | Self::UiEvent { .. } => {
                false
            }
        }
    }

    /// Evaluate without any collaborator.
    ///
    /// Returns `None` when short-circuit evaluation reaches an `AgentJudged`
    /// node, i.e. when the result depends on a judgment.
    pub fn evaluate_local(&self, context: &EvaluationContext) -> Option<bool> {
        match self {
            Self::Always => Some(true),
            Self::StepRef { step_id } => Some(context.is_step_completed(step_id)),
            Self::WorkflowRef { workflow_id } => Some(context.is_workflow_completed(workflow_id)),
            Self::UiEvent { event } => Some(context.has_event(*event)),
            Self::And { conditions } => {
                for condition in conditions {
                    if !condition.evaluate_local(context)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            Self::Or { conditions } => {
                for condition in conditions {
                    if condition.evaluate_local(context)? {
                        return Some(true);
                    }
                }
                Some(false)
            }
            Self::AgentJudged { .. } => None,
        }
    }
}
