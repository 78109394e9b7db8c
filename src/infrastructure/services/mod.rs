//! Infrastructure services

mod session;
mod step_engine_service;

pub use session::{TriggerOutcome, WorkflowSession};
pub use step_engine_service::StepEngineService;
