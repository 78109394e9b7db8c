//! Workflow and step entities

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::condition::Condition;
use super::error::WorkflowError;

/// Maximum length for workflow, step and agent IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Regex pattern for valid IDs: alphanumeric, hyphens and underscores
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap()
});

/// Validate an identifier string for the given kind ("Workflow", "Step", "Agent")
pub fn validate_id(kind: &str, id: &str) -> Result<(), WorkflowError> {
    if id.is_empty() {
        return Err(WorkflowError::validation(format!("{} ID cannot be empty", kind)));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(WorkflowError::validation(format!(
            "{} ID exceeds maximum length of {} characters",
            kind, MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(WorkflowError::validation(format!(
            "Invalid {} ID '{}': must be alphanumeric with hyphens or underscores, start and end with alphanumeric",
            kind.to_lowercase(),
            id
        )));
    }

    Ok(())
}

macro_rules! validated_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new validated ID
            pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
                let id = id.into();
                validate_id($kind, &id)?;
                Ok(Self(id))
            }

            /// Generate a fresh random ID
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4()))
            }

            /// Get the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = WorkflowError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_id!(
    /// Validated workflow identifier
    WorkflowId,
    "Workflow",
    "workflow"
);

validated_id!(
    /// Validated step identifier, unique within a workflow
    StepId,
    "Step",
    "step"
);

validated_id!(
    /// Validated agent identifier
    AgentId,
    "Agent",
    "agent"
);

/// Lifecycle status shared by workflows and steps
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

/// A single gated unit of workflow behavior: conditions plus actions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    id: StepId,

    workflow_id: WorkflowId,

    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Display and evaluation order within the workflow
    #[serde(default)]
    index: i32,

    /// Implicitly AND-ed: every entry must hold for the step to fire
    conditions: Vec<Condition>,

    actions: Vec<Action>,

    #[serde(default)]
    status: Status,

    /// Whether the step may fire again once completed
    #[serde(default)]
    repeat: bool,

    /// Compute tier hint forwarded to the agent collaborator
    #[serde(default)]
    beast_mode: bool,

    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl Step {
    /// Create a new step with no conditions or actions
    pub fn new(id: StepId, workflow_id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            workflow_id,
            name: name.into(),
            description: None,
            index: 0,
            conditions: Vec::new(),
            actions: Vec::new(),
            status: Status::Active,
            repeat: false,
            beast_mode: false,
            created_at: Utc::now(),
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_beast_mode(mut self, beast_mode: bool) -> Self {
        self.beast_mode = beast_mode;
        self
    }

    // Getters

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn beast_mode(&self) -> bool {
        self.beast_mode
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check the structural rules a stored step must satisfy
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::validation(format!(
                "Step '{}' must have a name",
                self.id
            )));
        }

        if self.conditions.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Step '{}' must have at least one condition",
                self.id
            )));
        }

        if self.actions.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Step '{}' must have at least one action",
                self.id
            )));
        }

        Ok(())
    }
}

/// A workflow definition: an ordered collection of steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    id: WorkflowId,

    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Ordered references to the steps this workflow owns
    #[serde(default)]
    step_ids: Vec<StepId>,

    #[serde(default)]
    status: Status,

    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new active workflow
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            step_ids: Vec::new(),
            status: Status::Active,
            created_at: now,
            updated_at: now,
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step_ids(mut self, step_ids: Vec<StepId>) -> Self {
        self.step_ids = step_ids;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn step_ids(&self) -> &[StepId] {
        &self.step_ids
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn contains_step(&self, id: &StepId) -> bool {
        self.step_ids.contains(id)
    }

    // Setters (mutate and update timestamp)

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.touch();
    }

    /// Append a step reference if it is not already present
    pub fn add_step_id(&mut self, id: StepId) {
        if !self.step_ids.contains(&id) {
            self.step_ids.push(id);
            self.touch();
        }
    }

    /// Remove a step reference, returning whether it was present
    pub fn remove_step_id(&mut self, id: &StepId) -> bool {
        let before = self.step_ids.len();
        self.step_ids.retain(|s| s != id);
        let removed = self.step_ids.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_valid() {
        assert!(WorkflowId::new("my-workflow").is_ok());
        assert!(StepId::new("step_1").is_ok());
        assert!(AgentId::new("a").is_ok());
        assert!(StepId::new("step-3f0c2a7e-1b9d-4c55-9a0e-64f1a2b3c4d5").is_ok());
    }

    #[test]
    fn test_id_invalid() {
        assert!(WorkflowId::new("").is_err());
        assert!(WorkflowId::new("-invalid").is_err());
        assert!(StepId::new("invalid-").is_err());
        assert!(StepId::new("has spaces").is_err());

        let long_id = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(AgentId::new(long_id).is_err());
    }

    #[test]
    fn test_generated_ids_are_valid_and_prefixed() {
        let id = StepId::generate();
        assert!(id.as_str().starts_with("step-"));
        assert!(StepId::new(id.as_str()).is_ok());
        assert_ne!(StepId::generate(), StepId::generate());
    }

    #[test]
    fn test_id_serialization() {
        let id = StepId::new("welcome").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"welcome\"");

        assert!(serde_json::from_str::<StepId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_step_builder() {
        let step = Step::new(
            StepId::new("greet").unwrap(),
            WorkflowId::new("onboarding").unwrap(),
            "Greet",
        )
        .with_index(2)
        .with_condition(Condition::Always)
        .with_action(Action::text("Hello"))
        .with_repeat(true)
        .with_beast_mode(true);

        assert_eq!(step.index(), 2);
        assert!(step.repeat());
        assert!(step.beast_mode());
        assert!(step.is_active());
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_step_validation() {
        let base = Step::new(
            StepId::new("greet").unwrap(),
            WorkflowId::new("onboarding").unwrap(),
            "Greet",
        );

        let err = base.clone().with_action(Action::text("hi")).validate().unwrap_err();
        assert!(err.to_string().contains("at least one condition"));

        let err = base.with_condition(Condition::Always).validate().unwrap_err();
        assert!(err.to_string().contains("at least one action"));
    }

    #[test]
    fn test_step_deserialization_defaults() {
        let json = r#"{
            "id": "greet",
            "workflow_id": "onboarding",
            "name": "Greet",
            "conditions": [{"type": "always"}],
            "actions": [{"type": "text", "text": "Hello"}]
        }"#;

        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.index(), 0);
        assert_eq!(step.status(), Status::Active);
        assert!(!step.repeat());
        assert!(!step.beast_mode());
    }

    #[test]
    fn test_workflow_step_references() {
        let mut workflow = Workflow::new(WorkflowId::new("onboarding").unwrap(), "Onboarding");
        let step = StepId::new("greet").unwrap();

        workflow.add_step_id(step.clone());
        workflow.add_step_id(step.clone());
        assert_eq!(workflow.step_ids().len(), 1);
        assert!(workflow.contains_step(&step));

        assert!(workflow.remove_step_id(&step));
        assert!(!workflow.remove_step_id(&step));
    }

    #[test]
    fn test_workflow_mutation_updates_timestamp() {
        let mut workflow = Workflow::new(WorkflowId::new("mutable").unwrap(), "Original");
        let original_updated = workflow.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(10));
        workflow.set_status(Status::Inactive);

        assert!(workflow.updated_at() > original_updated);
        assert!(!workflow.is_active());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Inactive).unwrap(), "\"inactive\"");
        let status: Status = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(status, Status::Active);
    }
}
