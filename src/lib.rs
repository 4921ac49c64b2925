//! Picks the single construction project to fund and plans the material transfers between
//! depots that go with it.
//!
//! Raw tables are normalized into [`Parameters`], pruned to the arcs that can carry useful
//! flow ([`Sets`]), turned into a MIP ([`AllocationModel`]) and solved in two phases by a
//! [`LexicographicSolver`]: transport cost first, project priority second.

pub mod config;
pub mod models;
pub mod problem;
pub mod solution;
pub mod solver;

use derive_more::Display;
use log::info;

pub use config::AllocationConfig;
pub use models::allocation::{
    AllocationModel, LexicographicError, LexicographicSolver, Parameters, Phase, Sets,
};
pub use problem::{InputError, RawTables};
pub use solution::AllocationResult;
pub use solver::{SolverError, SolverService};

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    Input(InputError),
    #[display(fmt = "{}", _0)]
    Solver(SolverError),
    #[display(fmt = "{}", _0)]
    Lexicographic(LexicographicError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Input(e) => Some(e),
            Error::Solver(e) => Some(e),
            Error::Lexicographic(e) => Some(e),
        }
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Error::Input(e)
    }
}

impl From<SolverError> for Error {
    fn from(e: SolverError) -> Self {
        Error::Solver(e)
    }
}

impl From<LexicographicError> for Error {
    fn from(e: LexicographicError) -> Self {
        Error::Lexicographic(e)
    }
}

/// Normalizes `tables`, builds the model and solves both phases with `solver`.
/// Malformed input fails before any model is built.
pub fn allocate<S: SolverService>(
    tables: &RawTables,
    config: &AllocationConfig,
    solver: S,
) -> Result<AllocationResult, Error> {
    let parameters = Parameters::new(tables)?;
    let sets = Sets::new(&parameters);
    let model = AllocationModel::build(&sets, &parameters, config.capacity_scope);

    let result = LexicographicSolver::new(solver, config).solve(model)?;
    info!(
        "selected project {:?}, transport cost {}, priority {}",
        result.selected_project(),
        result.cost_phase.objective,
        result.priority_phase.objective
    );
    Ok(result)
}
