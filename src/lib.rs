//! Conditional workflow step engine
//!
//! Decides which workflow steps fire for an end-user instance:
//! - Condition trees over completed steps, completed workflows, UI events and agent judgments
//! - Dependency extraction, ordering and graph validation across steps
//! - Action resolution through agent delegation, bounded by a depth guard
//! - Scheduling passes that thread an explicit evaluation context

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::{
    ActionResolver, AgentInvoker, AgentJudge, ConditionEvaluator, DomainError, StepScheduler,
    WorkflowRepository,
};
use infrastructure::agent::{HttpAgentClient, OfflineAgentClient};
use infrastructure::services::StepEngineService;
use tracing::info;

/// Pick the agent collaborators: the HTTP agent service when configured,
/// otherwise the offline client
pub fn create_agent_clients(
    config: &AppConfig,
) -> Result<(Arc<dyn AgentInvoker>, Arc<dyn AgentJudge>), DomainError> {
    match config.agent.base_url {
        Some(ref base_url) => {
            info!("Using agent service at {}", base_url);
            let client = Arc::new(HttpAgentClient::from_config(&config.agent)?);
            let invoker: Arc<dyn AgentInvoker> = client.clone();
            let judge: Arc<dyn AgentJudge> = client;
            Ok((invoker, judge))
        }
        None => {
            info!("No agent service configured; agents run offline");
            let client = Arc::new(OfflineAgentClient::new());
            let invoker: Arc<dyn AgentInvoker> = client.clone();
            let judge: Arc<dyn AgentJudge> = client;
            Ok((invoker, judge))
        }
    }
}

/// Build a scheduler with the engine limits from configuration
pub fn create_scheduler(
    config: &AppConfig,
    invoker: Arc<dyn AgentInvoker>,
    judge: Arc<dyn AgentJudge>,
) -> StepScheduler {
    let engine = &config.engine;

    let evaluator = ConditionEvaluator::new(judge)
        .with_judge_timeout(Duration::from_millis(engine.judge_timeout_ms));
    let resolver = ActionResolver::new(invoker)
        .with_max_depth(engine.max_resolution_depth)
        .with_agent_timeout(Duration::from_millis(engine.agent_timeout_ms));

    StepScheduler::new(evaluator, resolver).with_ordering(engine.ordering)
}

/// Create the engine service with all collaborators initialized
pub fn create_engine_service(
    config: &AppConfig,
    repository: Arc<dyn WorkflowRepository>,
) -> Result<StepEngineService, DomainError> {
    let (invoker, judge) = create_agent_clients(config)?;
    let scheduler = create_scheduler(config, invoker, judge);
    Ok(StepEngineService::new(repository, scheduler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvaluationContext, StepOrdering};
    use crate::infrastructure::workflow::InMemoryWorkflowRepository;

    #[tokio::test]
    async fn test_create_engine_service_offline() {
        let repository = Arc::new(InMemoryWorkflowRepository::new());
        let (workflow, steps) = domain::workflow::starter_workflow().unwrap();
        repository.import(workflow, steps).await.unwrap();

        let mut config = AppConfig::default();
        config.engine.ordering = StepOrdering::Topological;

        let service = create_engine_service(&config, repository.clone()).unwrap();
        let outcome = service
            .run_pass("defi-onboarding", &mut EvaluationContext::new())
            .await
            .unwrap();

        assert_eq!(outcome.completed_step_ids.len(), 3);
        let completed = repository
            .completions(&domain::WorkflowId::new("defi-onboarding").unwrap())
            .await;
        assert_eq!(completed.len(), 3);
    }

    #[test]
    fn test_create_agent_clients_with_service() {
        let mut config = AppConfig::default();
        config.agent.base_url = Some("http://localhost:9000".to_string());

        assert!(create_agent_clients(&config).is_ok());
    }
}
