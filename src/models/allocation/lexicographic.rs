use derive_more::Display;
use log::{debug, info, warn};

use super::model::AllocationModel;
use crate::{
    config::{AllocationConfig, LexMode},
    models::{program::ConstrSense, utils::ConvertVars},
    solution::{AllocationResult, PhaseResult},
    solver::{Assignment, Outcome, SolverError, SolverService},
};

pub const COST_LOCK: &str = "cost_lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    /// minimize transport cost
    #[display(fmt = "cost")]
    Cost,
    /// maximize the funded priority
    #[display(fmt = "priority")]
    Priority,
}

#[derive(Debug, Display)]
pub enum LexicographicError {
    #[display(fmt = "{} phase is infeasible", _0)]
    Infeasible(Phase),
    #[display(fmt = "{} phase is unbounded", _0)]
    Unbounded(Phase),
    #[display(fmt = "{} phase: {}", phase, source)]
    Solver { phase: Phase, source: SolverError },
}

impl std::error::Error for LexicographicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LexicographicError::Solver { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Runs the cost phase and then the priority phase against a solver service.
///
/// In [`LexMode::Independent`] (the default) the second phase only swaps the active objective,
/// so the funded project may raise transport cost above the first phase optimum.
/// In [`LexMode::Strict`] that optimum is added as an upper bound (`cost_lock`) before the
/// second phase.
pub struct LexicographicSolver<S> {
    solver: S,
    config: AllocationConfig,
}

impl<S: SolverService> LexicographicSolver<S> {
    pub fn new(solver: S, config: &AllocationConfig) -> LexicographicSolver<S> {
        LexicographicSolver {
            solver,
            config: config.clone(),
        }
    }

    /// Solves both phases in order. The model is consumed: after this call it carries the
    /// cost lock and is of no further use.
    pub fn solve(
        &mut self,
        mut model: AllocationModel,
    ) -> Result<AllocationResult, LexicographicError> {
        // Init -> cost solved
        model.model.deactivate(model.priority);
        model.model.activate(model.cost);
        let cost_phase = self.phase(&model, Phase::Cost)?;

        if self.config.mode == LexMode::Strict {
            let bound = cost_phase.objective + self.config.lock_tolerance(cost_phase.objective);
            debug!("locking transport cost at {}", bound);
            let lhs = model.model.objective(model.cost).expr.clone();
            model.model.add_constr(COST_LOCK, lhs, ConstrSense::Le, bound);
        }

        // cost solved -> priority solved
        model.model.activate(model.priority);
        model.model.deactivate(model.cost);
        let priority_phase = self.phase(&model, Phase::Priority)?;

        Ok(AllocationResult {
            cost_phase,
            priority_phase,
        })
    }

    fn phase(
        &mut self,
        model: &AllocationModel,
        phase: Phase,
    ) -> Result<PhaseResult, LexicographicError> {
        info!("Solving {} phase", phase);

        let outcome = self
            .solver
            .solve(&model.model)
            .map_err(|source| LexicographicError::Solver { phase, source })?;

        let values: Assignment = match outcome {
            Outcome::Optimal(values) => values,
            Outcome::Infeasible => return Err(LexicographicError::Infeasible(phase)),
            Outcome::Unbounded => return Err(LexicographicError::Unbounded(phase)),
        };

        if values.len() != model.model.vars().len() {
            return Err(LexicographicError::Solver {
                phase,
                source: SolverError::Failed(format!(
                    "expected {} values, got {}",
                    model.model.vars().len(),
                    values.len()
                )),
            });
        }

        let violated = model.model.violations(&values, 1e-6);
        if !violated.is_empty() {
            warn!("{} phase solution violates {:?}", phase, violated);
            return Err(LexicographicError::Solver {
                phase,
                source: SolverError::Failed(format!(
                    "reported optimum violates {}",
                    violated.join(", ")
                )),
            });
        }

        let objective = match phase {
            Phase::Cost => model.model.objective(model.cost),
            Phase::Priority => model.model.objective(model.priority),
        }
        .expr
        .eval(&values);
        info!("{} phase optimal, objective = {}", phase, objective);

        Ok(PhaseResult {
            phase,
            objective,
            select: model.vars.select.convert(&values),
            flow: model.vars.flow.convert(&values),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use serde_json::json;

    use super::*;
    use crate::{
        config::CapacityScope,
        models::{
            allocation::{
                model::{capacity_name, SINGLE_PROJECT},
                sets_and_parameters::{Parameters, Sets},
            },
            program::MipModel,
        },
        problem::RawTables,
        solver::MicroLpSolver,
    };

    /// Replays scripted outcomes and records which objective each call optimized
    struct Scripted {
        outcomes: VecDeque<Result<Outcome, SolverError>>,
        seen: Vec<(String, bool)>,
    }

    impl SolverService for Scripted {
        fn solve(&mut self, model: &MipModel) -> Result<Outcome, SolverError> {
            let objective = model.active_objective()?;
            self.seen
                .push((objective.name.clone(), model.constr(COST_LOCK).is_some()));
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(SolverError::Failed("no more outcomes".to_string())))
        }
    }

    fn scripted(outcomes: Vec<Result<Outcome, SolverError>>) -> Scripted {
        Scripted {
            outcomes: outcomes.into(),
            seen: Vec::new(),
        }
    }

    fn model_for(
        costs: serde_json::Value,
        stock: serde_json::Value,
        projects: serde_json::Value,
        scope: CapacityScope,
    ) -> AllocationModel {
        let raw = RawTables::from_values(costs, stock, projects).unwrap();
        let parameters = Parameters::new(&raw).unwrap();
        let sets = Sets::new(&parameters);
        AllocationModel::build(&sets, &parameters, scope)
    }

    /// one project (priority 5, 10 units of material 1), one arc costing 2.0, 10 units in stock
    fn scenario_one() -> AllocationModel {
        model_for(
            json!({ "(1, 2, 1)": 2.0 }),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 10.0 }]),
            json!([{ "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 10.0, "PRIOR": 5.0 }]),
            CapacityScope::Systemwide,
        )
    }

    fn solve(model: AllocationModel, mode: LexMode) -> Result<AllocationResult, LexicographicError> {
        let config = AllocationConfig {
            mode,
            ..AllocationConfig::default()
        };
        LexicographicSolver::new(MicroLpSolver::new(), &config).solve(model)
    }

    #[test]
    fn phases_run_cost_first_then_priority() {
        let model = scenario_one();
        let n = model.model.vars().len();
        let mut solver = LexicographicSolver::new(
            scripted(vec![
                Ok(Outcome::Optimal(vec![0.0; n].into())),
                Ok(Outcome::Optimal(vec![1.0, 0.0].into())),
            ]),
            &AllocationConfig::default(),
        );

        let result = solver.solve(model).unwrap();
        assert_eq!(
            solver.solver.seen,
            vec![("cost".to_string(), false), ("priority".to_string(), false)]
        );
        assert_eq!(result.cost_phase.phase, Phase::Cost);
        assert_eq!(result.priority_phase.objective, 5.0);
    }

    #[test]
    fn strict_mode_locks_cost_before_priority() {
        let model = scenario_one();
        let config = AllocationConfig {
            mode: LexMode::Strict,
            ..AllocationConfig::default()
        };
        let mut solver = LexicographicSolver::new(
            scripted(vec![
                Ok(Outcome::Optimal(vec![0.0, 0.0].into())),
                Ok(Outcome::Optimal(vec![1.0, 0.0].into())),
            ]),
            &config,
        );
        solver.solve(model).unwrap();
        assert_eq!(
            solver.solver.seen,
            vec![("cost".to_string(), false), ("priority".to_string(), true)]
        );
    }

    #[test]
    fn infeasible_assignments_are_rejected() {
        // a fractional select[1]
        let mut solver = LexicographicSolver::new(
            scripted(vec![Ok(Outcome::Optimal(vec![0.5, 0.0].into()))]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Solver {
                phase: Phase::Cost,
                source: SolverError::Failed(_),
            })
        ));

        // 12 units demanded from a depot holding 10
        let model = model_for(
            json!({ "(1, 2, 1)": 2.0 }),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 10.0 }]),
            json!([{ "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 12.0, "PRIOR": 5.0 }]),
            CapacityScope::Systemwide,
        );
        let mut solver = LexicographicSolver::new(
            scripted(vec![
                Ok(Outcome::Optimal(vec![0.0, 0.0].into())),
                Ok(Outcome::Optimal(vec![1.0, 0.0].into())),
            ]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(model),
            Err(LexicographicError::Solver {
                phase: Phase::Priority,
                ..
            })
        ));
    }

    #[test]
    fn infeasibility_is_reported_per_phase() {
        let mut solver = LexicographicSolver::new(
            scripted(vec![Ok(Outcome::Infeasible)]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Infeasible(Phase::Cost))
        ));
        // phase two is never attempted
        assert_eq!(solver.solver.seen.len(), 1);

        let mut solver = LexicographicSolver::new(
            scripted(vec![
                Ok(Outcome::Optimal(vec![0.0, 0.0].into())),
                Ok(Outcome::Infeasible),
            ]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Infeasible(Phase::Priority))
        ));
    }

    #[test]
    fn solver_failures_are_not_infeasibility() {
        let mut solver = LexicographicSolver::new(
            scripted(vec![
                Ok(Outcome::Optimal(vec![0.0, 0.0].into())),
                Err(SolverError::Failed("license expired".to_string())),
            ]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Solver {
                phase: Phase::Priority,
                ..
            })
        ));

        let mut solver = LexicographicSolver::new(
            scripted(vec![Ok(Outcome::Unbounded)]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Unbounded(Phase::Cost))
        ));
    }

    #[test]
    fn short_assignments_are_rejected() {
        let mut solver = LexicographicSolver::new(
            scripted(vec![Ok(Outcome::Optimal(vec![0.0].into()))]),
            &AllocationConfig::default(),
        );
        assert!(matches!(
            solver.solve(scenario_one()),
            Err(LexicographicError::Solver {
                phase: Phase::Cost,
                ..
            })
        ));
    }

    #[test]
    fn single_project_with_enough_stock() {
        let result = LexicographicSolver::new(MicroLpSolver::new(), &AllocationConfig::default())
            .solve(scenario_one())
            .unwrap();

        assert!(result.cost_phase.objective.abs() < 1e-6);
        assert!(result.cost_phase.flow[&(1, 2, 1)].abs() < 1e-6);
        assert!((result.priority_phase.objective - 5.0).abs() < 1e-6);
        assert_eq!(result.selected_project(), Some(1));
    }

    #[test]
    fn picks_the_best_feasible_project() {
        // 10 units in stock: project 1 needs 6, project 2 needs 8, both cannot be funded
        let model = model_for(
            json!({ "(1, 2, 1)": 1.0 }),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 10.0 }]),
            json!([
                { "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 6.0, "PRIOR": 3.0 },
                { "OBRA": 2, "COD_MAT": 1, "QTD_DEM": 8.0, "PRIOR": 7.0 },
            ]),
            CapacityScope::Systemwide,
        );
        let result = solve(model, LexMode::Strict).unwrap();
        assert_eq!(result.selected_project(), Some(2));
        assert!((result.priority_phase.objective - 7.0).abs() < 1e-6);

        // project 2 alone exceeds the stock, so project 1 is the best feasible singleton
        let model = model_for(
            json!({ "(1, 2, 1)": 1.0 }),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 10.0 }]),
            json!([
                { "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 6.0, "PRIOR": 3.0 },
                { "OBRA": 2, "COD_MAT": 1, "QTD_DEM": 12.0, "PRIOR": 7.0 },
            ]),
            CapacityScope::Systemwide,
        );
        let result = solve(model, LexMode::Independent).unwrap();
        assert_eq!(result.selected_project(), Some(1));
        assert!((result.priority_phase.objective - 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_cost_table_still_solves() {
        let model = model_for(
            json!({}),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 1.0 }]),
            json!([
                { "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 50.0, "PRIOR": 3.0 },
                { "OBRA": 2, "COD_MAT": 1, "QTD_DEM": 80.0, "PRIOR": 4.0 },
            ]),
            CapacityScope::Systemwide,
        );
        let result = solve(model, LexMode::Strict).unwrap();
        assert_eq!(result.cost_phase.objective, 0.0);
        assert!(result.cost_phase.flow.is_empty());
        // no capacity rows, so demand never binds
        assert_eq!(result.selected_project(), Some(2));
    }

    #[test]
    fn no_projects_is_a_trivial_model() {
        let model = model_for(json!({}), json!([]), json!([]), CapacityScope::Systemwide);
        let result = solve(model, LexMode::Strict).unwrap();
        assert_eq!(result.selected_project(), None);
        assert_eq!(result.priority_phase.objective, 0.0);
    }

    #[test]
    fn constraints_hold_in_both_phases() {
        for scope in [CapacityScope::Systemwide, CapacityScope::Incident] {
            let model = model_for(
                json!({
                    "(1, 2, 1)": 2.0,
                    "(2, 1, 1)": 1.0,
                    "(1, 2, 2)": 4.0,
                    "(2, 3, 2)": 1.0,
                }),
                json!([
                    { "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 6.0 },
                    { "COD_DEP": 2, "COD_MAT": 1, "ESTOQ": 3.0 },
                    { "COD_DEP": 1, "COD_MAT": 2, "ESTOQ": 4.0 },
                    { "COD_DEP": 2, "COD_MAT": 2, "ESTOQ": 2.0 },
                ]),
                json!([
                    { "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 2.0, "PRIOR": 4.0 },
                    { "OBRA": 1, "COD_MAT": 2, "QTD_DEM": 1.0, "PRIOR": 4.0 },
                    { "OBRA": 2, "COD_MAT": 2, "QTD_DEM": 3.0, "PRIOR": 9.0 },
                    { "OBRA": 3, "COD_MAT": 1, "QTD_DEM": 9.0, "PRIOR": 20.0 },
                ]),
                scope,
            );
            let reference = model.clone();
            let result = solve(model, LexMode::Strict).unwrap();

            for phase in [&result.cost_phase, &result.priority_phase] {
                let chosen: f64 = phase.select.values().sum();
                assert!(chosen <= 1.0 + 1e-6);

                assert!(reference.model.constr(SINGLE_PROJECT).is_some());
                for &(k, m) in &reference.capacity_rows {
                    let row = reference.model.constr(&capacity_name(k, m)).unwrap();
                    assert!(row.violation(&phase.values) < 1e-6, "{} violated", row.name);
                }
                assert!(phase.flow.values().all(|&f| f >= -1e-9));
            }
        }
    }

    /// a project that needs transport, demanding 5 at depot 2 which holds nothing
    fn transport_needed() -> AllocationModel {
        model_for(
            json!({ "(1, 2, 1)": 2.0 }),
            json!([{ "COD_DEP": 1, "COD_MAT": 1, "ESTOQ": 10.0 }]),
            json!([{ "OBRA": 1, "COD_MAT": 1, "QTD_DEM": 5.0, "PRIOR": 5.0 }]),
            CapacityScope::Incident,
        )
    }

    #[test]
    fn default_mode_does_not_reenforce_cost() {
        let model = transport_needed();
        let mut solver =
            LexicographicSolver::new(MicroLpSolver::new(), &AllocationConfig::default());
        let result = solver.solve(model).unwrap();

        assert!(result.cost_phase.objective.abs() < 1e-6);
        assert_eq!(result.cost_phase.selected_project(), None);
        assert_eq!(result.selected_project(), Some(1));
        assert!((result.priority_phase.objective - 5.0).abs() < 1e-6);
        assert!(result.flows()[&(1, 2, 1)] >= 5.0 - 1e-6);

        // the lock would have kept the project out
        let result = solve(transport_needed(), LexMode::Strict).unwrap();
        assert_eq!(result.selected_project(), None);
        assert!(result.priority_phase.objective.abs() < 1e-6);
    }

    #[test]
    fn strict_mode_keeps_the_phase_one_cost() {
        let model = scenario_one();
        let reference = model.clone();
        let result = solve(model, LexMode::Strict).unwrap();

        let cost = reference
            .model
            .objective(reference.cost)
            .expr
            .eval(&result.priority_phase.values);
        assert!(cost <= result.cost_phase.objective + 1e-6);
    }
}
