use std::collections::BTreeMap;

use derive_more::Constructor;
use itertools::iproduct;
use log::{debug, info};

use super::sets_and_parameters::{Parameters, Sets};
use crate::{
    config::CapacityScope,
    models::{
        program::{ConstrSense, LinExpr, MipModel, ModelSense, ObjectiveIndex, VarIndex},
        utils::AddVars,
    },
    problem::{ArcKey, DepotId, MaterialId, ProjectId},
};

pub const SINGLE_PROJECT: &str = "single_project";

/// Name of the capacity row of depot `k` and material `m`
pub fn capacity_name(k: DepotId, m: MaterialId) -> String {
    format!("capacity[{},{}]", k, m)
}

#[derive(Debug, Clone, Constructor)]
pub struct Variables {
    /// 1 if project p is funded
    pub select: BTreeMap<ProjectId, VarIndex>,
    /// quantity of material m moved from depot k to depot j, one per valid arc
    pub flow: BTreeMap<ArcKey, VarIndex>,
}

/// The allocation MIP together with handles to its variables and its two objectives
#[derive(Debug, Clone)]
pub struct AllocationModel {
    pub model: MipModel,
    pub vars: Variables,
    /// total transport cost, minimized
    pub cost: ObjectiveIndex,
    /// priority of the funded project, maximized
    pub priority: ObjectiveIndex,
    /// the (depot, material) pairs that received a capacity row
    pub capacity_rows: Vec<(DepotId, MaterialId)>,
}

impl AllocationModel {
    /// builds the allocation model. Both objectives are registered but left inactive.
    pub fn build(sets: &Sets, parameters: &Parameters, scope: CapacityScope) -> AllocationModel {
        info!(
            "Building allocation model: {} projects, {} valid arcs, {} capacity rows",
            sets.projects.len(),
            sets.valid.len(),
            scope
        );

        let mut model = MipModel::new("allocation");

        //*************CREATE VARIABLES*************//

        // 1 if project p is funded, 0 otherwise
        let select = sets.projects[..].binary(&mut model, "select");
        // material moved along each valid arc
        let flow = sets.valid[..].cont(&mut model, "flow");

        // ******************** OBJECTIVES ********************

        let cost_expr: LinExpr = sets
            .valid
            .iter()
            .map(|arc| (parameters.cost[arc], flow[arc]))
            .collect();
        let cost = model.add_objective("cost", cost_expr, ModelSense::Minimize);

        let priority_expr: LinExpr = sets
            .projects
            .iter()
            .map(|&p| (parameters.priority(p), select[&p]))
            .collect();
        let priority = model.add_objective("priority", priority_expr, ModelSense::Maximize);

        // ******************** ADD CONSTRAINTS ********************

        // at most one project is funded
        let lhs: LinExpr = select.values().map(|&x| (1.0, x)).collect();
        model.add_constr(SINGLE_PROJECT, lhs, ConstrSense::Le, 1.0);

        let capacity_rows = match scope {
            CapacityScope::Systemwide => {
                Self::systemwide_capacity(&mut model, sets, parameters, &select, &flow)
            }
            CapacityScope::Incident => {
                Self::incident_capacity(&mut model, sets, parameters, &select, &flow)
            }
        };

        debug!(
            "allocation model has {} variables and {} constraints",
            model.vars().len(),
            model.constrs().len()
        );

        AllocationModel {
            model,
            vars: Variables::new(select, flow),
            cost,
            priority,
            capacity_rows,
        }
    }

    /// demand of the funded project for material m
    fn demand_expr(
        sets: &Sets,
        parameters: &Parameters,
        select: &BTreeMap<ProjectId, VarIndex>,
        m: MaterialId,
    ) -> LinExpr {
        sets.projects
            .iter()
            .map(|&p| (parameters.demand(p, m), select[&p]))
            .filter(|(d, _)| *d > 0.0)
            .collect()
    }

    /// One row per valid origin and valid material. Every valid arc enters every row,
    /// once as outgoing and once as incoming flow.
    fn systemwide_capacity(
        model: &mut MipModel,
        sets: &Sets,
        parameters: &Parameters,
        select: &BTreeMap<ProjectId, VarIndex>,
        flow: &BTreeMap<ArcKey, VarIndex>,
    ) -> Vec<(DepotId, MaterialId)> {
        let mut rows = Vec::new();
        for (&k, &m) in iproduct!(&sets.origins, &sets.materials) {
            let mut lhs = Self::demand_expr(sets, parameters, select, m);
            for arc in &sets.valid {
                lhs.add_term(1.0, flow[arc]);
            }
            for arc in &sets.valid {
                lhs.add_term(-1.0, flow[arc]);
            }
            model.add_constr(&capacity_name(k, m), lhs, ConstrSense::Le, parameters.stock(k, m));
            rows.push((k, m));
        }
        rows
    }

    /// One row per depot touched by a valid arc and valid material, with only the flow of
    /// material m leaving and entering that depot.
    fn incident_capacity(
        model: &mut MipModel,
        sets: &Sets,
        parameters: &Parameters,
        select: &BTreeMap<ProjectId, VarIndex>,
        flow: &BTreeMap<ArcKey, VarIndex>,
    ) -> Vec<(DepotId, MaterialId)> {
        let mut rows = Vec::new();
        for (k, &m) in iproduct!(sets.depots(), &sets.materials) {
            let mut lhs = Self::demand_expr(sets, parameters, select, m);
            for arc in sets.valid.iter().filter(|&&(o, _, mm)| o == k && mm == m) {
                lhs.add_term(1.0, flow[arc]);
            }
            for arc in sets.valid.iter().filter(|&&(_, d, mm)| d == k && mm == m) {
                lhs.add_term(-1.0, flow[arc]);
            }
            model.add_constr(&capacity_name(k, m), lhs, ConstrSense::Le, parameters.stock(k, m));
            rows.push((k, m));
        }
        rows
    }
}
