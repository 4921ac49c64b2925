pub mod allocation;
pub mod program;
pub mod utils;
