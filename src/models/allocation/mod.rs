pub mod lexicographic;
pub mod model;
pub mod sets_and_parameters;

pub use lexicographic::{LexicographicError, LexicographicSolver, Phase};
pub use model::AllocationModel;
pub use sets_and_parameters::{Parameters, Sets};
