//! Workflow infrastructure implementations

mod definition;
mod in_memory_repository;

pub use definition::{DefinitionError, WorkflowDefinition};
pub use in_memory_repository::InMemoryWorkflowRepository;
