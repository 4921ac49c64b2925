//! The solver boundary. A [`SolverService`] takes a fully built [`MipModel`], optimizes its
//! single active objective and reports what happened.

use derive_more::Display;
use typed_index_collections::TiVec;

use crate::{
    config::{AllocationConfig, Backend},
    models::program::{MipModel, ModelError, VarIndex},
};

#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod microlp;

#[cfg(feature = "gurobi")]
pub use gurobi::GurobiSolver;
pub use microlp::MicroLpSolver;

/// Values of every variable of a model, indexed like the model's variables
pub type Assignment = TiVec<VarIndex, f64>;

/// Terminal result of one solve
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimal(Assignment),
    Infeasible,
    Unbounded,
}

/// The solver could not be run or stopped without a usable verdict
#[derive(Debug, Display)]
pub enum SolverError {
    #[display(fmt = "{}", _0)]
    Model(ModelError),
    /// The backend is not compiled in or not reachable
    #[display(fmt = "solver backend {} is unavailable: {}", _0, _1)]
    Unavailable(Backend, String),
    /// The backend failed, or stopped with a status that is neither optimal nor infeasible
    #[display(fmt = "solver failed: {}", _0)]
    Failed(String),
}

impl std::error::Error for SolverError {}

impl From<ModelError> for SolverError {
    fn from(e: ModelError) -> Self {
        SolverError::Model(e)
    }
}

pub trait SolverService {
    /// Optimize the active objective of `model`. Blocks until the solver reaches a verdict.
    fn solve(&mut self, model: &MipModel) -> Result<Outcome, SolverError>;
}

impl<S: SolverService + ?Sized> SolverService for Box<S> {
    fn solve(&mut self, model: &MipModel) -> Result<Outcome, SolverError> {
        (**self).solve(model)
    }
}

/// Instantiates the backend named in `config`
pub fn from_config(config: &AllocationConfig) -> Result<Box<dyn SolverService>, SolverError> {
    match config.backend {
        Backend::MicroLp => {
            if config.time_limit.is_some() {
                log::warn!("the microlp backend ignores time_limit");
            }
            Ok(Box::new(MicroLpSolver::new()))
        }
        #[cfg(feature = "gurobi")]
        Backend::Gurobi => Ok(Box::new(GurobiSolver::new(config.time_limit)?)),
        #[cfg(not(feature = "gurobi"))]
        Backend::Gurobi => Err(SolverError::Unavailable(
            Backend::Gurobi,
            "compiled without the `gurobi` feature".to_string(),
        )),
    }
}
