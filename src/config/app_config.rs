use serde::Deserialize;

use crate::domain::workflow::{
    StepOrdering, DEFAULT_AGENT_TIMEOUT_MS, DEFAULT_JUDGE_TIMEOUT_MS, DEFAULT_MAX_RESOLUTION_DEPTH,
};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub agent: AgentClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Scheduling and resolution limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum agent delegations while resolving one action
    pub max_resolution_depth: usize,
    pub judge_timeout_ms: u64,
    pub agent_timeout_ms: u64,
    pub ordering: StepOrdering,
}

/// Remote agent service; no `base_url` means agents run offline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentClientConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            judge_timeout_ms: DEFAULT_JUDGE_TIMEOUT_MS,
            agent_timeout_ms: DEFAULT_AGENT_TIMEOUT_MS,
            ordering: StepOrdering::default(),
        }
    }
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_ms: DEFAULT_AGENT_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("STEP_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
