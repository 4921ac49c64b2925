use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    models::allocation::lexicographic::Phase,
    problem::{ArcKey, DepotId, MaterialId, ProjectId, Quantity},
    solver::Assignment,
};

/// What a single phase produced
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    pub phase: Phase,
    /// value of the objective optimized in this phase
    pub objective: f64,
    /// value of select[p] for every project
    pub select: BTreeMap<ProjectId, f64>,
    /// value of flow[k, j, m] for every valid arc
    pub flow: BTreeMap<ArcKey, Quantity>,
    /// the raw assignment, indexed like the model's variables
    pub values: Assignment,
}

impl PhaseResult {
    /// The funded project, if any
    pub fn selected_project(&self) -> Option<ProjectId> {
        self.select
            .iter()
            .find(|(_, &x)| x > 0.5)
            .map(|(&p, _)| p)
    }
}

/// Result of both phases. The priority phase holds the final assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    pub cost_phase: PhaseResult,
    pub priority_phase: PhaseResult,
}

impl AllocationResult {
    pub fn selected_project(&self) -> Option<ProjectId> {
        self.priority_phase.selected_project()
    }

    /// The final movement plan
    pub fn flows(&self) -> &BTreeMap<ArcKey, Quantity> {
        &self.priority_phase.flow
    }

    pub fn report(&self, threshold: f64) -> Report {
        Report {
            selected_project: self.selected_project(),
            cost_phase: PhaseReport::new(&self.cost_phase, threshold),
            priority_phase: PhaseReport::new(&self.priority_phase, threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub origin: DepotId,
    pub destination: DepotId,
    pub material: MaterialId,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub objective: f64,
    pub selected_project: Option<ProjectId>,
    pub flows: Vec<FlowReport>,
}

impl PhaseReport {
    fn new(result: &PhaseResult, threshold: f64) -> PhaseReport {
        PhaseReport {
            objective: result.objective,
            selected_project: result.selected_project(),
            flows: result
                .flow
                .iter()
                .filter(|(_, &q)| q > threshold)
                .map(|(&(origin, destination, material), &quantity)| FlowReport {
                    origin,
                    destination,
                    material,
                    quantity,
                })
                .collect(),
        }
    }
}

/// Serializable summary of an [`AllocationResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub selected_project: Option<ProjectId>,
    pub cost_phase: PhaseReport,
    pub priority_phase: PhaseReport,
}
