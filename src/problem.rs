use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    num::ParseIntError,
    path::Path,
};

use derive_more::Display;
use serde::Deserialize;

/// The type used for depot ids
pub type DepotId = u64;
/// The type used for material codes
pub type MaterialId = u64;
/// The type used for project ("obra") ids
pub type ProjectId = u64;
/// The type used for stock and demand quantities
pub type Quantity = f64;
/// The type used for unit transport costs
pub type Cost = f64;

/// A transport arc: (origin depot, destination depot, material)
pub type ArcKey = (DepotId, DepotId, MaterialId);

/// A single entry of the transport cost table. The key is the composite
/// `"(origin, destination, material)"` string; a missing cost means there is no route.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub key: String,
    pub cost: Option<Cost>,
}

/// Stock of one material held at one depot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockRecord {
    #[serde(rename = "COD_DEP", alias = "depot")]
    pub depot: DepotId,
    #[serde(rename = "COD_MAT", alias = "material")]
    pub material: MaterialId,
    #[serde(rename = "ESTOQ", alias = "quantity")]
    pub quantity: Quantity,
}

/// Demand of one project for one material, together with the project's priority
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectRecord {
    #[serde(rename = "OBRA", alias = "project")]
    pub project: ProjectId,
    #[serde(rename = "COD_MAT", alias = "material")]
    pub material: MaterialId,
    #[serde(rename = "QTD_DEM", alias = "demand")]
    pub demand: Quantity,
    #[serde(rename = "PRIOR", alias = "priority", default)]
    pub priority: Option<f64>,
}

/// The three raw input tables, as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTables {
    pub costs: Vec<CostRecord>,
    pub stock: Vec<StockRecord>,
    pub projects: Vec<ProjectRecord>,
}

#[derive(Debug, Display)]
pub enum InputError {
    #[display(fmt = "failed to read {}: {}", _0, _1)]
    Io(String, std::io::Error),
    #[display(fmt = "malformed table: {}", _0)]
    Json(serde_json::Error),
    /// A composite cost key that is not of the form `(k, j, m)`
    #[display(fmt = "malformed arc key {:?}", _0)]
    MalformedKey(String),
    #[display(fmt = "malformed arc key {:?}: {}", _0, _1)]
    MalformedKeyComponent(String, ParseIntError),
    /// Two cost keys describing the same arc
    #[display(fmt = "arc {:?} appears more than once in the cost table", _0)]
    DuplicateArc(ArcKey),
    /// A negative or NaN quantity, cost or priority
    #[display(fmt = "invalid {} {} for {}", field, value, at)]
    InvalidValue {
        field: &'static str,
        value: f64,
        at: String,
    },
    #[display(fmt = "project {} has conflicting priorities {} and {}", project, first, second)]
    ConflictingPriority {
        project: ProjectId,
        first: f64,
        second: f64,
    },
}

impl std::error::Error for InputError {}

impl From<serde_json::Error> for InputError {
    fn from(e: serde_json::Error) -> Self {
        InputError::Json(e)
    }
}

impl RawTables {
    /// Reads the three tables from JSON files.
    ///
    /// The cost file is an object mapping `"(origin, destination, material)"` to a unit cost
    /// (or `null` when no route exists). The stock and project files are arrays of records using
    /// the column names `COD_DEP`/`COD_MAT`/`ESTOQ` and `OBRA`/`COD_MAT`/`QTD_DEM`/`PRIOR`.
    pub fn from_files(
        costs: impl AsRef<Path>,
        stock: impl AsRef<Path>,
        projects: impl AsRef<Path>,
    ) -> Result<RawTables, InputError> {
        let costs: BTreeMap<String, Option<Cost>> = read_json(costs.as_ref())?;
        Ok(RawTables {
            costs: costs
                .into_iter()
                .map(|(key, cost)| CostRecord { key, cost })
                .collect(),
            stock: read_json(stock.as_ref())?,
            projects: read_json(projects.as_ref())?,
        })
    }

    /// Builds the tables from already-parsed JSON values, in the same layout as [`RawTables::from_files`].
    pub fn from_values(
        costs: serde_json::Value,
        stock: serde_json::Value,
        projects: serde_json::Value,
    ) -> Result<RawTables, InputError> {
        let costs: BTreeMap<String, Option<Cost>> = serde_json::from_value(costs)?;
        Ok(RawTables {
            costs: costs
                .into_iter()
                .map(|(key, cost)| CostRecord { key, cost })
                .collect(),
            stock: serde_json::from_value(stock)?,
            projects: serde_json::from_value(projects)?,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let file = File::open(path).map_err(|e| InputError::Io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Parses a composite arc key such as `"(3, 7, 1200)"` into its three integer components.
/// The surrounding parentheses are optional; anything other than exactly three
/// non-negative integers is an error.
pub fn parse_arc_key(key: &str) -> Result<ArcKey, InputError> {
    let inner = key.trim();
    let inner = inner.strip_prefix('(').unwrap_or(inner);
    let inner = inner.strip_suffix(')').unwrap_or(inner);

    let parts = inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| InputError::MalformedKeyComponent(key.to_string(), e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match parts[..] {
        [k, j, m] => Ok((k, j, m)),
        _ => Err(InputError::MalformedKey(key.to_string())),
    }
}
