//! Application configuration

mod app_config;

pub use app_config::{AgentClientConfig, AppConfig, EngineConfig, LogFormat, LoggingConfig};
