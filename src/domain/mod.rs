//! Domain layer - Core business logic and entities

pub mod error;
pub mod workflow;

pub use error::DomainError;
pub use workflow::{
    Action, ActionResolver, AgentAction, AgentId, AgentInvocation, AgentInvoker, AgentJudge,
    Condition, ConditionEvaluator, EvaluationContext, JudgmentRequest, PassOutcome, Status, Step,
    StepError, StepId, StepOrdering, StepScheduler, StepState, TextAction, UiEvent, Workflow,
    WorkflowError, WorkflowId, WorkflowRepository,
};
