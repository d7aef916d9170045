//! Output categories, checkpoint metadata and named result tables.

use std::collections::BTreeMap;
use std::fmt;

use ep_core::KeyedDataset;
use serde::{Deserialize, Serialize};

/// Tables that always land in the dispatch folder, whichever side produced them.
pub const DISPATCH_TABLES: [&str; 4] = [
    "hourly_dispatch_results",
    "electricity_reconciliation",
    "hourly_marginal_cost",
    "hourly_production_cost",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputCategory {
    Demand,
    Supply,
    Combined,
    Dispatch,
}

impl OutputCategory {
    pub const ALL: [OutputCategory; 4] = [
        OutputCategory::Demand,
        OutputCategory::Supply,
        OutputCategory::Combined,
        OutputCategory::Dispatch,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            OutputCategory::Demand => "demand_outputs",
            OutputCategory::Supply => "supply_outputs",
            OutputCategory::Combined => "combined_outputs",
            OutputCategory::Dispatch => "dispatch_outputs",
        }
    }

    /// Folder a table named `table` is written to.
    pub fn route(self, table: &str) -> OutputCategory {
        if DISPATCH_TABLES.contains(&table) {
            OutputCategory::Dispatch
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTag {
    /// Demand solved, supply not yet attached.
    Demand,
    /// Demand and supply solved.
    Full,
    /// Whatever state the model was in when a run failed.
    Error,
}

impl CheckpointTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointTag::Demand => "demand",
            CheckpointTag::Full => "full",
            CheckpointTag::Error => "error",
        }
    }
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub scenario_id: String,
    pub tag: CheckpointTag,
    pub phase: String,
    pub timestamp: String,
    /// SHA-256 of the payload file.
    pub digest: String,
    pub size_bytes: u64,
}

/// Named result tables produced by one side of the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    tables: BTreeMap<String, KeyedDataset>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `table` under `name`, replacing any earlier table of that name.
    pub fn insert(&mut self, name: impl Into<String>, table: KeyedDataset) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<&KeyedDataset> {
        self.tables.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<KeyedDataset> {
        self.tables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyedDataset)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_tables_are_rerouted() {
        assert_eq!(
            OutputCategory::Combined.route("electricity_reconciliation"),
            OutputCategory::Dispatch
        );
        assert_eq!(
            OutputCategory::Supply.route("hourly_marginal_cost"),
            OutputCategory::Dispatch
        );
        assert_eq!(OutputCategory::Combined.route("c_costs"), OutputCategory::Combined);
    }

    #[test]
    fn result_set_replaces_by_name() {
        let mut set = ResultSet::new();
        let a = KeyedDataset::scalar(&["year"]).unwrap();
        let b = KeyedDataset::scalar(&["sector"]).unwrap();
        set.insert("energy", a);
        set.insert("energy", b.clone());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("energy"), Some(&b));
        assert_eq!(set.names().collect::<Vec<_>>(), ["energy"]);
    }
}
