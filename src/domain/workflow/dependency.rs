//! Structural dependency analysis over step conditions.
//!
//! These helpers drive ordering hints and dependency visualization. Triggering
//! itself never consults them: a step fires only when its conditions evaluate
//! to true.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::condition::{Condition, UiEvent};
use super::entity::{Step, StepId, Workflow, WorkflowId};
use super::error::WorkflowError;

/// Every step identity a condition tree can reference
pub fn extract_step_ids(condition: &Condition) -> BTreeSet<StepId> {
    let mut ids = BTreeSet::new();
    collect_step_ids(condition, &mut ids);
    ids
}

fn collect_step_ids(condition: &Condition, ids: &mut BTreeSet<StepId>) {
    match condition {
        Condition::Always | Condition::UiEvent { .. } | Condition::WorkflowRef { .. } => {}
        Condition::StepRef { step_id } => {
            ids.insert(step_id.clone());
        }
        Condition::And { conditions } | Condition::Or { conditions } => {
            for child in conditions {
                collect_step_ids(child, ids);
            }
        }
        Condition::AgentJudged { step_id, .. } => {
            ids.insert(step_id.clone());
        }
    }
}

/// Every workflow identity a condition tree can reference
pub fn extract_workflow_ids(condition: &Condition) -> BTreeSet<WorkflowId> {
    let mut ids = BTreeSet::new();
    collect_workflow_ids(condition, &mut ids);
    ids
}

fn collect_workflow_ids(condition: &Condition, ids: &mut BTreeSet<WorkflowId>) {
    match condition {
        Condition::Always
        | Condition::UiEvent { .. }
        | Condition::StepRef { .. }
        | Condition::AgentJudged { .. } => {}
        Condition::WorkflowRef { workflow_id } => {
            ids.insert(workflow_id.clone());
        }
        Condition::And { conditions } | Condition::Or { conditions } => {
            for child in conditions {
                collect_workflow_ids(child, ids);
            }
        }
    }
}

/// Union of the step identities referenced by all of a step's conditions
pub fn step_dependencies(step: &Step) -> BTreeSet<StepId> {
    step.conditions().iter().flat_map(extract_step_ids).collect()
}

impl Condition {
    pub fn step_ids(&self) -> BTreeSet<StepId> {
        extract_step_ids(self)
    }

    pub fn workflow_ids(&self) -> BTreeSet<WorkflowId> {
        extract_workflow_ids(self)
    }
}

impl Step {
    pub fn dependencies(&self) -> BTreeSet<StepId> {
        step_dependencies(self)
    }
}

/// Step-to-step edge for dependency visualization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    /// `<source>-<target>`
    pub id: String,
    pub source: StepId,
    pub target: StepId,
    pub label: &'static str,
}

/// Label describing how a step is gated
pub fn step_condition_label(step: &Step) -> &'static str {
    match step.conditions() {
        [single] => single.description(),
        [] => "Always",
        _ => "All Conditions",
    }
}

/// Edges from each dependency to the step it gates.
///
/// Only sources present in `steps` produce an edge; self-references
/// (e.g. a step judged on its own identity) are not edges.
pub fn dependency_edges(steps: &[Step]) -> Vec<DependencyEdge> {
    let known: BTreeSet<&StepId> = steps.iter().map(Step::id).collect();
    let known = &known;

    steps
        .iter()
        .flat_map(|step| {
            let label = step_condition_label(step);
            step_dependencies(step)
                .into_iter()
                .filter(move |source| source != step.id() && known.contains(source))
                .map(move |source| DependencyEdge {
                    id: format!("{}-{}", source, step.id()),
                    target: step.id().clone(),
                    source,
                    label,
                })
        })
        .collect()
}

/// Order steps so every step comes after the in-set steps it depends on.
///
/// Ties (and independent steps) are ordered by ascending `index`, then id.
/// Dependencies on steps outside the set and self-references are ignored.
pub fn topological_order(steps: &[Step]) -> Result<Vec<&Step>, WorkflowError> {
    let (ordered, blocked) = kahn(steps);

    if blocked.is_empty() {
        Ok(ordered)
    } else {
        let ids: Vec<&str> = blocked.iter().map(|id| id.as_str()).collect();
        Err(WorkflowError::circular_reference(format!(
            "steps [{}] form or depend on a dependency cycle",
            ids.join(", ")
        )))
    }
}

fn kahn(steps: &[Step]) -> (Vec<&Step>, BTreeSet<StepId>) {
    let by_id: BTreeMap<&StepId, &Step> = steps.iter().map(|s| (s.id(), s)).collect();

    let mut in_degree: BTreeMap<&StepId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&StepId, Vec<&StepId>> = BTreeMap::new();

    for step in steps {
        let deps: Vec<&StepId> = step_dependencies(step)
            .iter()
            .filter(|dep| *dep != step.id())
            .filter_map(|dep| by_id.get_key_value(dep).map(|(key, _)| *key))
            .collect();

        in_degree.insert(step.id(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(step.id());
        }
    }

    let mut ready: BTreeSet<(i32, &StepId)> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| (by_id[id].index(), *id))
        .collect();

    let mut ordered = Vec::with_capacity(steps.len());

    while let Some(next) = ready.pop_first() {
        let (_, id) = next;
        ordered.push(by_id[id]);

        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert((by_id[dependent].index(), *dependent));
                }
            }
        }
    }

    let placed: BTreeSet<&StepId> = ordered.iter().map(|s| s.id()).collect();
    let blocked = steps
        .iter()
        .map(Step::id)
        .filter(|id| !placed.contains(id))
        .cloned()
        .collect();

    (ordered, blocked)
}

/// Step reference that points outside the step set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub step_id: StepId,
    pub missing: StepId,
}

/// Step reference into another workflow of the tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalReference {
    pub step_id: StepId,
    pub target: StepId,
}

/// Structural report over a workflow's step graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphReport {
    /// Steps that are part of, or depend on, a cycle
    pub blocked_steps: BTreeSet<StepId>,
    pub dangling_references: Vec<DanglingReference>,
    pub external_references: Vec<ExternalReference>,
}

impl GraphReport {
    /// External references do not make a graph invalid
    pub fn is_valid(&self) -> bool {
        self.blocked_steps.is_empty() && self.dangling_references.is_empty()
    }
}

/// Report cycles and step references that point outside `steps`.
///
/// References to ids in `external_steps` are listed as external; any other
/// reference outside the step set is dangling.
pub fn validate_graph(steps: &[Step], external_steps: &BTreeSet<StepId>) -> GraphReport {
    let known: BTreeSet<&StepId> = steps.iter().map(Step::id).collect();
    let mut report = GraphReport::default();

    for step in steps {
        for dep in step_dependencies(step) {
            if known.contains(&dep) {
                continue;
            }

            if external_steps.contains(&dep) {
                report.external_references.push(ExternalReference {
                    step_id: step.id().clone(),
                    target: dep,
                });
            } else {
                report.dangling_references.push(DanglingReference {
                    step_id: step.id().clone(),
                    missing: dep,
                });
            }
        }
    }

    let (_, blocked_steps) = kahn(steps);
    report.blocked_steps = blocked_steps;
    report
}

/// Reverse index from triggers to the steps they gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyIndex {
    ui_events: BTreeMap<UiEvent, BTreeSet<StepId>>,
    step_completed: BTreeMap<StepId, BTreeSet<StepId>>,
    workflow_completed: BTreeMap<WorkflowId, BTreeSet<StepId>>,
    judged: BTreeMap<StepId, BTreeSet<StepId>>,
}

impl DependencyIndex {
    /// Build the index for one workflow; inactive workflows gate nothing
    pub fn build(workflow: &Workflow, steps: &[Step]) -> Self {
        let mut index = Self::default();
        if !workflow.is_active() {
            return index;
        }

        for step in steps {
            for condition in step.conditions() {
                index.collect(condition, step.id());
            }
        }

        index
    }

    fn collect(&mut self, condition: &Condition, step: &StepId) {
        match condition {
            Condition::Always => {}
            Condition::UiEvent { event } => {
                self.ui_events.entry(*event).or_default().insert(step.clone());
            }
            Condition::StepRef { step_id } => {
                self.step_completed
                    .entry(step_id.clone())
                    .or_default()
                    .insert(step.clone());
            }
            Condition::WorkflowRef { workflow_id } => {
                self.workflow_completed
                    .entry(workflow_id.clone())
                    .or_default()
                    .insert(step.clone());
            }
            Condition::AgentJudged { step_id, .. } => {
                self.judged
                    .entry(step_id.clone())
                    .or_default()
                    .insert(step.clone());
            }
            Condition::And { conditions } | Condition::Or { conditions } => {
                for child in conditions {
                    self.collect(child, step);
                }
            }
        }
    }

    pub fn gated_by_event(&self, event: UiEvent) -> Option<&BTreeSet<StepId>> {
        self.ui_events.get(&event)
    }

    pub fn dependents_of_step(&self, id: &StepId) -> Option<&BTreeSet<StepId>> {
        self.step_completed.get(id)
    }

    pub fn dependents_of_workflow(&self, id: &WorkflowId) -> Option<&BTreeSet<StepId>> {
        self.workflow_completed.get(id)
    }

    pub fn judged_on(&self, id: &StepId) -> Option<&BTreeSet<StepId>> {
        self.judged.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ui_events.is_empty()
            && self.step_completed.is_empty()
            && self.workflow_completed.is_empty()
            && self.judged.is_empty()
    }
}
