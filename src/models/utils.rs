use std::{collections::BTreeMap, fmt::Debug};

use typed_index_collections::TiVec;

use super::program::{MipModel, VarIndex, VarType};

pub trait AddVars {
    type Out;

    /// Create a variable for every index
    fn vars(&self, model: &mut MipModel, base_name: &str, vtype: VarType) -> Self::Out;

    /// Binary variables
    fn binary(&self, model: &mut MipModel, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Binary)
    }

    /// A continuous non-negative variable
    fn cont(&self, model: &mut MipModel, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Continuous)
    }
}

/// A sparse family of variables: one per key in the slice, named after the key.
impl<K: Ord + Copy + Debug> AddVars for [K] {
    type Out = BTreeMap<K, VarIndex>;

    fn vars(&self, model: &mut MipModel, base_name: &str, vtype: VarType) -> Self::Out {
        let upper = match vtype {
            VarType::Binary => 1.0,
            VarType::Continuous => f64::INFINITY,
        };

        self.iter()
            .map(|key| {
                let name = format!("{}[{:?}]", base_name, key);
                (*key, model.add_var(&name, vtype, 0.0, upper))
            })
            .collect()
    }
}

/// Trait that converts model variables to their values in a solution
pub trait ConvertVars {
    type Out;
    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out;
}

impl<K: Ord + Copy> ConvertVars for BTreeMap<K, VarIndex> {
    type Out = BTreeMap<K, f64>;

    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out {
        self.iter().map(|(k, var)| (*k, var.convert(values))).collect()
    }
}

impl ConvertVars for VarIndex {
    type Out = f64;

    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out {
        values[*self]
    }
}
