//! Workflow error types

use thiserror::Error;

use crate::domain::DomainError;

/// Errors that are fatal to a whole scheduling pass or to a workflow operation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Circular reference detected: {0}")]
    CircularReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Workflow data could not be loaded: {0}")]
    LoadFailed(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn circular_reference(message: impl Into<String>) -> Self {
        Self::CircularReference(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::NotFound(message),
            DomainError::Validation { message } => Self::Validation(message),
            DomainError::Provider { provider, message } => {
                Self::ServiceUnavailable(format!("{}: {}", provider, message))
            }
            other => Self::LoadFailed(other.to_string()),
        }
    }
}
