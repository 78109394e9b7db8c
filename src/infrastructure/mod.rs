//! Infrastructure layer - External service implementations

pub mod agent;
pub mod logging;
pub mod observability;
pub mod services;
pub mod workflow;
