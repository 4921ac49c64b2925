use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, trace};
use typed_index_collections::TiVec;

use super::{Outcome, SolverError, SolverService};
use crate::models::program::{ConstrSense, LinExpr, MipModel, ModelSense, VarIndex, VarType};

/// Pure Rust branch and bound (good_lp's microlp backend). Each solve translates the model
/// from scratch, so the model may change freely between calls.
#[derive(Debug, Default)]
pub struct MicroLpSolver {}

impl MicroLpSolver {
    pub fn new() -> MicroLpSolver {
        MicroLpSolver {}
    }
}

fn to_expression(expr: &LinExpr, vars: &TiVec<VarIndex, Variable>) -> Expression {
    let mut out = Expression::from(expr.constant());
    for (var, coeff) in expr.terms() {
        out.add_mul(*coeff, vars[*var]);
    }
    out
}

impl SolverService for MicroLpSolver {
    fn solve(&mut self, model: &MipModel) -> Result<Outcome, SolverError> {
        let objective = model.active_objective()?;
        debug!(
            "microlp: solving {} ({} vars, {} constraints) for {} {}",
            model.name(),
            model.vars().len(),
            model.constrs().len(),
            objective.sense,
            objective.name
        );

        // Rows without variables are decided here; microlp is never handed an empty row.
        for c in model.constrs().iter().filter(|c| c.expr.is_empty()) {
            if c.violation(&TiVec::new()) > 0.0 {
                debug!("microlp: constant row {} is violated", c.name);
                return Ok(Outcome::Infeasible);
            }
        }

        if model.vars().is_empty() {
            return Ok(Outcome::Optimal(TiVec::new()));
        }

        let mut problem_vars = ProblemVariables::new();
        let vars: TiVec<VarIndex, Variable> = model
            .vars()
            .iter()
            .map(|v| {
                let mut def = variable().name(v.name.clone());
                if v.vtype == VarType::Binary {
                    def = def.binary();
                }
                if v.lower.is_finite() {
                    def = def.min(v.lower);
                }
                if v.upper.is_finite() {
                    def = def.max(v.upper);
                }
                problem_vars.add(def)
            })
            .collect();

        let obj = to_expression(&objective.expr, &vars);
        let unsolved = match objective.sense {
            ModelSense::Minimize => problem_vars.minimise(obj),
            ModelSense::Maximize => problem_vars.maximise(obj),
        };
        let mut problem = unsolved.using(microlp);

        for c in model.constrs().iter().filter(|c| !c.expr.is_empty()) {
            trace!("microlp: {} {} {}", c.name, c.sense, c.rhs);
            let lhs = to_expression(&c.expr, &vars);
            problem = problem.with(match c.sense {
                ConstrSense::Le => constraint::leq(lhs, c.rhs),
                ConstrSense::Ge => constraint::geq(lhs, c.rhs),
                ConstrSense::Eq => constraint::eq(lhs, c.rhs),
            });
        }

        match problem.solve() {
            Ok(solution) => Ok(Outcome::Optimal(
                vars.iter().map(|v| solution.value(*v)).collect(),
            )),
            Err(ResolutionError::Infeasible) => Ok(Outcome::Infeasible),
            Err(ResolutionError::Unbounded) => Ok(Outcome::Unbounded),
            Err(e) => Err(SolverError::Failed(e.to_string())),
        }
    }
}
