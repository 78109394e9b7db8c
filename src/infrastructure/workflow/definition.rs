//! Workflow definition files (JSON or TOML)

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::workflow::starter_workflow;
use crate::domain::{Step, Workflow, WorkflowError};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read definition file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    #[error("Unsupported definition format '{0}', expected .json or .toml")]
    UnsupportedFormat(String),

    #[error("Invalid definition: {0}")]
    ValidationError(String),
}

/// A workflow together with the steps it owns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub workflow: Workflow,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    pub fn new(workflow: Workflow, steps: Vec<Step>) -> Self {
        Self { workflow, steps }
    }

    /// Load a definition, picking the format from the file extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading workflow definition");

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let content = std::fs::read_to_string(path)?;
        let definition = match extension.as_str() {
            "json" => Self::from_json_str(&content)?,
            "toml" => Self::from_toml_str(&content)?,
            other => return Err(DefinitionError::UnsupportedFormat(other.to_string())),
        };

        debug!(
            "Loaded workflow '{}' with {} step(s)",
            definition.workflow.id(),
            definition.steps.len()
        );
        Ok(definition)
    }

    /// The built-in starter workflow as a definition
    pub fn starter() -> Result<Self, WorkflowError> {
        let (workflow, steps) = starter_workflow()?;
        Ok(Self::new(workflow, steps))
    }

    pub fn from_json_str(content: &str) -> Result<Self, DefinitionError> {
        let definition: Self = serde_json::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let definition: Self = toml::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn to_json_pretty(&self) -> Result<String, DefinitionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml_string(&self) -> Result<String, DefinitionError> {
        Ok(toml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        for step in &self.steps {
            if step.workflow_id() != self.workflow.id() {
                return Err(DefinitionError::ValidationError(format!(
                    "step '{}' declares workflow '{}' but is defined under '{}'",
                    step.id(),
                    step.workflow_id(),
                    self.workflow.id()
                )));
            }

            step.validate()
                .map_err(|e| DefinitionError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    pub fn into_parts(self) -> (Workflow, Vec<Step>) {
        (self.workflow, self.steps)
    }
}
