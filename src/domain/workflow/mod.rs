//! Workflow domain module
//!
//! A workflow is an ordered set of steps. Each step carries a list of
//! conditions (implicitly AND-ed) and a list of actions. A scheduling pass
//! evaluates every pending step against an [`EvaluationContext`], fires the
//! eligible ones and resolves their actions to terminal text replies.
//!
//! ## Conditions
//!
//! - `always` - holds unconditionally
//! - `step_ref` / `workflow_ref` - a step or workflow has completed
//! - `ui_event` - an `onPageLoad`, `onVisited`, `onClicked` or `onHovered` event was observed
//! - `and` / `or` - short-circuit composites
//! - `agent_judged` - an agent decides whether the condition holds
//!
//! ## Actions
//!
//! `text` actions are terminal. `agent` actions delegate to an agent, whose
//! answer is itself an action; the declared `return` is used when the agent
//! declines or cannot be reached.

mod action;
mod agent;
mod condition;
mod context;
pub mod dependency;
mod entity;
mod error;
mod evaluator;
pub mod repository;
mod resolver;
mod scheduler;
pub mod template;

pub use action::{Action, AgentAction, TextAction};
pub use agent::{AgentInvocation, AgentInvoker, AgentJudge, JudgmentRequest};
pub use condition::{Condition, UiEvent};
pub use context::EvaluationContext;
pub use dependency::{
    dependency_edges, extract_step_ids, extract_workflow_ids, topological_order, validate_graph,
    DanglingReference, DependencyEdge, DependencyIndex, ExternalReference, GraphReport,
};
pub use entity::{validate_id, AgentId, Status, Step, StepId, Workflow, WorkflowId, MAX_ID_LENGTH};
pub use error::WorkflowError;
pub use evaluator::{
    ConditionEvaluationError, ConditionEvaluator, ConditionOutcome, DEFAULT_JUDGE_TIMEOUT_MS,
};
pub use repository::WorkflowRepository;
pub use resolver::{
    ActionResolver, HopOutcome, Resolution, ResolutionError, ResolutionFailure, ResolutionHop,
    DEFAULT_AGENT_TIMEOUT_MS, DEFAULT_MAX_RESOLUTION_DEPTH,
};
pub use scheduler::{PassOutcome, ReferenceKind, StepError, StepOrdering, StepScheduler, StepState};
pub use template::starter_workflow;

#[cfg(test)]
pub use agent::{MockAgentInvoker, MockAgentJudge};
