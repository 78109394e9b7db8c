//! Run command - one scheduling pass over a definition file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::info;

use crate::domain::{EvaluationContext, StepId, StepOrdering, UiEvent, WorkflowId};
use crate::infrastructure::workflow::{InMemoryWorkflowRepository, WorkflowDefinition};

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow definition file (.json or .toml)
    #[arg(long, short)]
    pub definition: PathBuf,

    /// Observed UI event (onPageLoad, onVisited, onClicked, onHovered)
    #[arg(long = "event", short)]
    pub events: Vec<UiEvent>,

    /// Step already completed by this instance
    #[arg(long = "completed-step")]
    pub completed_steps: Vec<String>,

    /// Workflow already completed by this instance
    #[arg(long = "completed-workflow")]
    pub completed_workflows: Vec<String>,

    /// Step of another workflow that conditions may reference
    #[arg(long = "known-step")]
    pub known_steps: Vec<String>,

    /// Step ordering (overrides config)
    #[arg(long)]
    pub ordering: Option<StepOrdering>,
}

/// Run one pass and print the outcome as JSON
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = super::load_config();
    if let Some(ordering) = args.ordering {
        config.engine.ordering = ordering;
    }

    let definition = WorkflowDefinition::from_file(&args.definition)?;
    let workflow_id = definition.workflow.id().clone();
    let mut context = build_context(&args)?;

    let repository = Arc::new(InMemoryWorkflowRepository::new());
    let (workflow, steps) = definition.into_parts();
    repository.import(workflow, steps).await?;

    let service = crate::create_engine_service(&config, repository)?;
    info!(
        workflow_id = %workflow_id,
        ordering = ?config.engine.ordering,
        "Running pass"
    );

    let outcome = service.run_pass(workflow_id.as_str(), &mut context).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

fn build_context(args: &RunArgs) -> anyhow::Result<EvaluationContext> {
    let mut context = EvaluationContext::new();

    for event in &args.events {
        context.record_event(*event);
    }

    for id in &args.completed_steps {
        context.mark_step_completed(StepId::new(id.as_str())?);
    }

    for id in &args.known_steps {
        context.register_step(StepId::new(id.as_str())?);
    }

    for id in &args.completed_workflows {
        context.mark_workflow_completed(WorkflowId::new(id.as_str())?);
    }

    Ok(context)
}
