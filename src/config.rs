use std::{fs::File, io::BufReader, path::Path};

use clap::ArgEnum;
use derive_more::Display;
use serde::Deserialize;

use crate::problem::InputError;

/// Which transport terms enter the capacity row of depot `k` and material `m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, ArgEnum)]
#[serde(rename_all = "snake_case")]
pub enum CapacityScope {
    /// Every valid arc contributes to every row, and rows exist for each
    /// (origin, material) pair in the product of valid origins and valid materials.
    #[display(fmt = "systemwide")]
    Systemwide,
    /// Only arcs leaving or entering `k` with material `m` contribute, and rows
    /// exist for every depot touched by a valid arc.
    #[display(fmt = "incident")]
    Incident,
}

/// How the second phase relates to the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, ArgEnum)]
#[serde(rename_all = "snake_case")]
pub enum LexMode {
    /// Phase two is solved on the unchanged model, so it may raise the phase one cost
    #[display(fmt = "independent")]
    Independent,
    /// The phase one cost is bounded by its optimum before phase two runs
    #[display(fmt = "strict")]
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, ArgEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[display(fmt = "microlp")]
    #[clap(name = "microlp")]
    #[serde(rename = "microlp")]
    MicroLp,
    #[display(fmt = "gurobi")]
    Gurobi,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationConfig {
    pub capacity_scope: CapacityScope,
    pub mode: LexMode,
    /// Absolute slack allowed on the locked cost in strict mode
    pub lock_abs_tolerance: f64,
    /// Relative slack allowed on the locked cost in strict mode
    pub lock_rel_tolerance: f64,
    pub backend: Backend,
    /// Wall clock limit per solve, in seconds. Only honoured by the Gurobi backend.
    pub time_limit: Option<f64>,
    /// Flows at or below this quantity are left out of reports
    pub report_threshold: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig {
            capacity_scope: CapacityScope::Systemwide,
            mode: LexMode::Independent,
            lock_abs_tolerance: 1e-6,
            lock_rel_tolerance: 1e-9,
            backend: Backend::MicroLp,
            time_limit: None,
            report_threshold: 1e-6,
        }
    }
}

impl AllocationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<AllocationConfig, InputError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| InputError::Io(path.display().to_string(), e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// The slack added to the phase one optimum `cost` when it is locked
    pub fn lock_tolerance(&self, cost: f64) -> f64 {
        self.lock_abs_tolerance + self.lock_rel_tolerance * cost.abs()
    }
}
