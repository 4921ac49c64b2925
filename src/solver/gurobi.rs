use grb::{expr::LinExpr as GrbLinExpr, prelude::*, Status};
use log::{debug, warn};
use typed_index_collections::TiVec;

use super::{Outcome, SolverError, SolverService};
use crate::{
    config::Backend,
    models::program::{self, ConstrSense, LinExpr, MipModel, ModelSense, VarIndex},
};

impl From<grb::Error> for SolverError {
    fn from(e: grb::Error) -> Self {
        SolverError::Failed(format!("gurobi: {}", e))
    }
}

/// Gurobi through `grb`. The environment is created once and reused for every solve.
pub struct GurobiSolver {
    env: Env,
    time_limit: Option<f64>,
}

impl GurobiSolver {
    pub fn new(time_limit: Option<f64>) -> Result<GurobiSolver, SolverError> {
        let env = Env::new("").map_err(|e| SolverError::Unavailable(Backend::Gurobi, e.to_string()))?;
        Ok(GurobiSolver { env, time_limit })
    }

    fn linexpr(expr: &LinExpr, vars: &TiVec<VarIndex, Var>) -> GrbLinExpr {
        let mut out = GrbLinExpr::new();
        for (var, coeff) in expr.terms() {
            out.add_term(*coeff, vars[*var]);
        }
        out.add_constant(expr.constant());
        out
    }

    /// builds the gurobi counterpart of `model`
    fn build(&self, model: &MipModel) -> grb::Result<(Model, TiVec<VarIndex, Var>)> {
        let mut m = Model::with_env(model.name(), &self.env)?;
        // Disable output logging.
        m.set_param(param::OutputFlag, 0)?;
        if let Some(limit) = self.time_limit {
            m.set_param(param::TimeLimit, limit)?;
        }

        let mut vars = TiVec::with_capacity(model.vars().len());
        for v in model.vars() {
            let vtype = match v.vtype {
                program::VarType::Binary => VarType::Binary,
                program::VarType::Continuous => VarType::Continuous,
            };
            vars.push(m.add_var(&v.name, vtype, 0.0, v.lower, v.upper, std::iter::empty())?);
        }

        // itegrate all the variables into the model
        m.update()?;

        for c in model.constrs() {
            let lhs = Self::linexpr(&c.expr, &vars);
            let rhs = c.rhs;
            match c.sense {
                ConstrSense::Le => m.add_constr(&c.name, c!(lhs <= rhs))?,
                ConstrSense::Ge => m.add_constr(&c.name, c!(lhs >= rhs))?,
                ConstrSense::Eq => m.add_constr(&c.name, c!(lhs == rhs))?,
            };
        }

        Ok((m, vars))
    }
}

impl SolverService for GurobiSolver {
    fn solve(&mut self, model: &MipModel) -> Result<Outcome, SolverError> {
        let objective = model.active_objective()?;
        let (mut m, vars) = self.build(model)?;

        let sense = match objective.sense {
            ModelSense::Minimize => Minimize,
            ModelSense::Maximize => Maximize,
        };
        m.set_objective(Self::linexpr(&objective.expr, &vars), sense)?;

        debug!("gurobi: optimizing {} for {}", model.name(), objective.name);
        m.optimize()?;

        match m.status()? {
            Status::Optimal => {
                let values = vars
                    .iter()
                    .map(|v| m.get_obj_attr(attr::X, v))
                    .collect::<grb::Result<TiVec<VarIndex, f64>>>()?;
                Ok(Outcome::Optimal(values))
            }
            Status::Infeasible => Ok(Outcome::Infeasible),
            Status::Unbounded => Ok(Outcome::Unbounded),
            Status::InfOrUnbd => {
                warn!("gurobi: {} is infeasible or unbounded, reporting infeasible", model.name());
                Ok(Outcome::Infeasible)
            }
            status => Err(SolverError::Failed(format!(
                "gurobi stopped with status {:?}",
                status
            ))),
        }
    }
}
