//! Describe command - conditions, dependency edges and graph report

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::domain::workflow::dependency::{
    dependency_edges, step_condition_label, topological_order, validate_graph, DependencyEdge,
    GraphReport,
};
use crate::domain::{Step, StepId};
use crate::infrastructure::workflow::WorkflowDefinition;

/// Arguments for the describe command
#[derive(Args, Clone, Debug)]
pub struct DescribeArgs {
    /// Workflow definition file (.json or .toml)
    #[arg(long, short)]
    pub definition: PathBuf,

    /// Step of another workflow that conditions may reference
    #[arg(long = "known-step")]
    pub known_steps: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StepSummary<'a> {
    id: &'a StepId,
    name: &'a str,
    index: i32,
    active: bool,
    label: &'static str,
    conditions: Vec<&'static str>,
    depends_on: Vec<StepId>,
}

#[derive(Debug, Serialize)]
struct Description<'a> {
    workflow: &'a str,
    steps: Vec<StepSummary<'a>>,
    edges: Vec<DependencyEdge>,
    report: GraphReport,
    /// Present only when the graph has no cycle
    topological_order: Option<Vec<&'a StepId>>,
}

/// Print a JSON description of a definition
pub fn run(args: DescribeArgs) -> anyhow::Result<()> {
    super::load_config();

    let definition = WorkflowDefinition::from_file(&args.definition)?;
    let external_steps = args
        .known_steps
        .iter()
        .map(|id| StepId::new(id.as_str()))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let description = describe(&definition, &external_steps);
    println!("{}", serde_json::to_string_pretty(&description)?);

    Ok(())
}

fn describe<'a>(
    definition: &'a WorkflowDefinition,
    external_steps: &BTreeSet<StepId>,
) -> Description<'a> {
    let steps = &definition.steps;

    Description {
        workflow: definition.workflow.id().as_str(),
        steps: steps.iter().map(summarize).collect(),
        edges: dependency_edges(steps),
        report: validate_graph(steps, external_steps),
        topological_order: topological_order(steps)
            .ok()
            .map(|ordered| ordered.into_iter().map(Step::id).collect()),
    }
}

fn summarize(step: &Step) -> StepSummary<'_> {
    StepSummary {
        id: step.id(),
        name: step.name(),
        index: step.index(),
        active: step.is_active(),
        label: step_condition_label(step),
        conditions: step.conditions().iter().map(|c| c.description()).collect(),
        depends_on: step.dependencies().into_iter().collect(),
    }
}
