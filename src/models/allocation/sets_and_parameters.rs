use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, trace, warn};

use crate::problem::{
    parse_arc_key, ArcKey, Cost, DepotId, InputError, MaterialId, ProjectId, Quantity, RawTables,
};

/// Canonical parameters of the allocation model, keyed by integer ids
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// unit transport cost of material m from depot k to depot j. `INFINITY` if there is no route
    pub cost: BTreeMap<ArcKey, Cost>,
    /// stock of material m held at depot k
    pub stock: BTreeMap<(DepotId, MaterialId), Quantity>,
    /// quantity of material m demanded by project p
    pub demand: BTreeMap<(ProjectId, MaterialId), Quantity>,
    /// priority of project p
    pub priority: BTreeMap<ProjectId, f64>,
}

fn check(field: &'static str, value: f64, at: impl FnOnce() -> String) -> Result<f64, InputError> {
    if value.is_nan() || value < 0.0 {
        return Err(InputError::InvalidValue {
            field,
            value,
            at: at(),
        });
    }
    Ok(value)
}

/// Insert `value` at `key`, summing with whatever is already there
fn accumulate<K: Ord + Copy + std::fmt::Debug>(
    map: &mut BTreeMap<K, Quantity>,
    key: K,
    value: Quantity,
    what: &str,
) {
    match map.entry(key) {
        Entry::Vacant(e) => {
            e.insert(value);
        }
        Entry::Occupied(mut e) => {
            warn!("{} {:?} listed more than once, summing quantities", what, key);
            *e.get_mut() += value;
        }
    }
}

impl Parameters {
    /// Normalizes the raw tables into keyed mappings. Fails on the first malformed record.
    pub fn new(tables: &RawTables) -> Result<Parameters, InputError> {
        let mut cost = BTreeMap::new();
        for record in &tables.costs {
            let arc = parse_arc_key(&record.key)?;
            let value = match record.cost {
                Some(c) => check("cost", c, || record.key.clone())?,
                None => f64::INFINITY,
            };
            if cost.insert(arc, value).is_some() {
                return Err(InputError::DuplicateArc(arc));
            }
        }

        let mut stock = BTreeMap::new();
        for record in &tables.stock {
            let key = (record.depot, record.material);
            let quantity = check("stock", record.quantity, || format!("{:?}", key))?;
            accumulate(&mut stock, key, quantity, "stock");
        }

        let mut demand = BTreeMap::new();
        let mut priority: BTreeMap<ProjectId, Option<f64>> = BTreeMap::new();
        for record in &tables.projects {
            let key = (record.project, record.material);
            let quantity = check("demand", record.demand, || format!("{:?}", key))?;
            accumulate(&mut demand, key, quantity, "demand");

            let current = priority.entry(record.project).or_default();
            if let Some(p) = record.priority {
                let p = check("priority", p, || format!("project {}", record.project))?;
                match *current {
                    Some(first) if first != p => {
                        return Err(InputError::ConflictingPriority {
                            project: record.project,
                            first,
                            second: p,
                        })
                    }
                    _ => *current = Some(p),
                }
            }
        }

        let priority = priority
            .into_iter()
            .map(|(p, prio)| (p, prio.unwrap_or(0.0)))
            .collect();

        let parameters = Parameters {
            cost,
            stock,
            demand,
            priority,
        };

        debug!(
            "normalized {} arcs, {} stock entries, {} demand entries, {} projects",
            parameters.cost.len(),
            parameters.stock.len(),
            parameters.demand.len(),
            parameters.priority.len()
        );

        Ok(parameters)
    }

    /// Stock of `material` at `depot`, 0 if absent
    pub fn stock(&self, depot: DepotId, material: MaterialId) -> Quantity {
        self.stock.get(&(depot, material)).copied().unwrap_or(0.0)
    }

    /// Demand of `project` for `material`, 0 if absent
    pub fn demand(&self, project: ProjectId, material: MaterialId) -> Quantity {
        self.demand.get(&(project, material)).copied().unwrap_or(0.0)
    }

    /// Priority of `project`, 0 if absent
    pub fn priority(&self, project: ProjectId) -> f64 {
        self.priority.get(&project).copied().unwrap_or(0.0)
    }

    /// Depots appearing as a transport origin
    pub fn origins(&self) -> BTreeSet<DepotId> {
        self.cost.keys().map(|&(k, _, _)| k).collect()
    }

    /// Depots appearing as a transport destination
    pub fn destinations(&self) -> BTreeSet<DepotId> {
        self.cost.keys().map(|&(_, j, _)| j).collect()
    }

    /// Materials appearing in the cost table
    pub fn materials(&self) -> BTreeSet<MaterialId> {
        self.cost.keys().map(|&(_, _, m)| m).collect()
    }

    pub fn projects(&self) -> BTreeSet<ProjectId> {
        self.priority.keys().copied().collect()
    }
}

/// Sets for the allocation model, restricted to the arcs that can carry useful flow
#[derive(Debug, Clone, PartialEq)]
pub struct Sets {
    /// Projects that can be selected
    pub projects: Vec<ProjectId>,
    /// Arcs with a known cost, whose origin holds the material and whose material is demanded
    pub valid: Vec<ArcKey>,
    /// Origin depots of the valid arcs
    pub origins: BTreeSet<DepotId>,
    /// Destination depots of the valid arcs
    pub destinations: BTreeSet<DepotId>,
    /// Materials of the valid arcs
    pub materials: BTreeSet<MaterialId>,
    /// (origin, material) pairs of the valid arcs
    pub origin_materials: BTreeSet<(DepotId, MaterialId)>,
}

impl Sets {
    pub fn new(parameters: &Parameters) -> Sets {
        let demanded: BTreeSet<MaterialId> = parameters
            .demand
            .iter()
            .filter(|(_, &q)| q > 0.0)
            .map(|(&(_, m), _)| m)
            .collect();

        let valid = parameters
            .cost
            .iter()
            .filter(|(&(k, j, m), &c)| {
                let keep = c.is_finite() && parameters.stock(k, m) > 0.0 && demanded.contains(&m);
                if !keep {
                    trace!("dropping arc {:?}", (k, j, m));
                }
                keep
            })
            .map(|(arc, _)| *arc)
            .collect_vec();

        let sets = Sets {
            projects: parameters.priority.keys().copied().collect(),
            origins: valid.iter().map(|&(k, _, _)| k).collect(),
            destinations: valid.iter().map(|&(_, j, _)| j).collect(),
            materials: valid.iter().map(|&(_, _, m)| m).collect(),
            origin_materials: valid.iter().map(|&(k, _, m)| (k, m)).collect(),
            valid,
        };

        debug!(
            "{} of {} arcs are valid ({} origins, {} destinations, {} materials)",
            sets.valid.len(),
            parameters.cost.len(),
            sets.origins.len(),
            sets.destinations.len(),
            sets.materials.len()
        );

        sets
    }

    /// Depots incident to at least one valid arc
    pub fn depots(&self) -> BTreeSet<DepotId> {
        self.origins.union(&self.destinations).copied().collect()
    }
}
