//! A small, solver-agnostic mixed-integer linear program.
//!
//! Models are built once and handed to a [`SolverService`](crate::solver::SolverService) by
//! reference. Objectives are registered up front and switched on and off between solves.

use derive_more::{Display, From, Into};
use log::trace;
use typed_index_collections::TiVec;

/// Handle of a decision variable inside a [`MipModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into, Display)]
pub struct VarIndex(usize);

/// Handle of an objective registered on a [`MipModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct ObjectiveIndex(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Binary,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub vtype: VarType,
    pub lower: f64,
    pub upper: f64,
}

/// An affine expression `Σ coeff * var + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarIndex, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    pub fn add_term(&mut self, coeff: f64, var: VarIndex) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn add_constant(&mut self, constant: f64) -> &mut Self {
        self.constant += constant;
        self
    }

    pub fn terms(&self) -> &[(VarIndex, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the expression under `values`
    pub fn eval(&self, values: &TiVec<VarIndex, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[*var])
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(f64, VarIndex)> for LinExpr {
    fn from_iter<T: IntoIterator<Item = (f64, VarIndex)>>(iter: T) -> Self {
        let mut expr = LinExpr::new();
        for (coeff, var) in iter {
            expr.add_term(coeff, var);
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConstrSense {
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "==")]
    Eq,
}

/// `expr (sense) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: ConstrSense,
    pub rhs: f64,
}

impl Constraint {
    /// How far `values` is from satisfying the constraint (0 when satisfied)
    pub fn violation(&self, values: &TiVec<VarIndex, f64>) -> f64 {
        let lhs = self.expr.eval(values);
        match self.sense {
            ConstrSense::Le => (lhs - self.rhs).max(0.0),
            ConstrSense::Ge => (self.rhs - lhs).max(0.0),
            ConstrSense::Eq => (lhs - self.rhs).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ModelSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub name: String,
    pub expr: LinExpr,
    pub sense: ModelSense,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ModelError {
    #[display(fmt = "model {} has no active objective", _0)]
    NoActiveObjective(String),
    #[display(fmt = "model {} has more than one active objective", _0)]
    MultipleActiveObjectives(String),
}

impl std::error::Error for ModelError {}

#[derive(Debug, Clone)]
pub struct MipModel {
    name: String,
    vars: TiVec<VarIndex, Variable>,
    constrs: Vec<Constraint>,
    objectives: TiVec<ObjectiveIndex, Objective>,
}

impl MipModel {
    pub fn new(name: &str) -> MipModel {
        MipModel {
            name: name.to_string(),
            vars: TiVec::new(),
            constrs: Vec::new(),
            objectives: TiVec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, lower: f64, upper: f64) -> VarIndex {
        self.vars.push_and_get_key(Variable {
            name: name.to_string(),
            vtype,
            lower,
            upper,
        })
    }

    /// A binary variable
    pub fn add_binvar(&mut self, name: &str) -> VarIndex {
        self.add_var(name, VarType::Binary, 0.0, 1.0)
    }

    /// A continuous non-negative variable
    pub fn add_ctsvar(&mut self, name: &str) -> VarIndex {
        self.add_var(name, VarType::Continuous, 0.0, f64::INFINITY)
    }

    pub fn add_constr(&mut self, name: &str, expr: LinExpr, sense: ConstrSense, rhs: f64) {
        trace!("{}: adding constraint {} ({} terms)", self.name, name, expr.terms().len());
        self.constrs.push(Constraint {
            name: name.to_string(),
            expr,
            sense,
            rhs,
        });
    }

    /// Registers an objective. New objectives start out inactive.
    pub fn add_objective(&mut self, name: &str, expr: LinExpr, sense: ModelSense) -> ObjectiveIndex {
        self.objectives.push_and_get_key(Objective {
            name: name.to_string(),
            expr,
            sense,
            active: false,
        })
    }

    pub fn activate(&mut self, objective: ObjectiveIndex) {
        self.objectives[objective].active = true;
    }

    pub fn deactivate(&mut self, objective: ObjectiveIndex) {
        self.objectives[objective].active = false;
    }

    pub fn objective(&self, objective: ObjectiveIndex) -> &Objective {
        &self.objectives[objective]
    }

    /// The single objective that is currently switched on
    pub fn active_objective(&self) -> Result<&Objective, ModelError> {
        let mut active = self.objectives.iter().filter(|o| o.active);
        match (active.next(), active.next()) {
            (Some(objective), None) => Ok(objective),
            (None, _) => Err(ModelError::NoActiveObjective(self.name.clone())),
            (Some(_), Some(_)) => Err(ModelError::MultipleActiveObjectives(self.name.clone())),
        }
    }

    pub fn vars(&self) -> &TiVec<VarIndex, Variable> {
        &self.vars
    }

    pub fn constrs(&self) -> &[Constraint] {
        &self.constrs
    }

    pub fn constr(&self, name: &str) -> Option<&Constraint> {
        self.constrs.iter().find(|c| c.name == name)
    }

    /// Names of the constraints (and variable bounds) violated by more than `tolerance` under `values`
    pub fn violations(&self, values: &TiVec<VarIndex, f64>, tolerance: f64) -> Vec<String> {
        let bounds = self.vars.iter_enumerated().filter_map(|(idx, var)| {
            let value = values[idx];
            let outside = value < var.lower - tolerance || value > var.upper + tolerance;
            let fractional =
                var.vtype == VarType::Binary && (value - value.round()).abs() > tolerance;
            (outside || fractional).then(|| var.name.clone())
        });

        let rows = self
            .constrs
            .iter()
            .filter(|c| c.violation(values) > tolerance)
            .map(|c| c.name.clone());

        bounds.chain(rows).collect()
    }
}
