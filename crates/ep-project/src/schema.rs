//! Model configuration schema.

use std::path::PathBuf;

use ep_core::Key;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub version: u32,
    pub name: String,
    /// Root of output folders and checkpoints, relative to the config file.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    pub case: CaseDef,
    pub geography: GeographyDef,
    pub supply_years: Vec<i64>,
    #[serde(default)]
    pub output_detail: OutputDetailDef,
    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseDef {
    #[serde(default)]
    pub author: String,
    pub currency_year: i64,
    pub currency_name: String,
    pub mass_unit: String,
    pub energy_unit: String,
    /// Demand energy before this year is excluded from combined energy.
    pub current_year: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeographyDef {
    pub demand_primary: String,
    pub supply_primary: String,
    pub combined_outputs: String,
    #[serde(default)]
    pub correspondences: Vec<CorrespondenceDef>,
}

/// Overlap weights between the regions of two geographies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrespondenceDef {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub rows: Vec<CorrespondenceRowDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrespondenceRowDef {
    pub from: Key,
    pub to: Key,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputDetailDef {
    #[serde(default)]
    pub output_tco: bool,
    #[serde(default)]
    pub output_payback: bool,
    #[serde(default = "default_io_step")]
    pub io_table_write_step: i64,
    /// Dimensions kept when aggregating direct demand costs and emissions.
    #[serde(default)]
    pub combined_levels: Vec<String>,
}

fn default_io_step() -> i64 {
    5
}

impl Default for OutputDetailDef {
    fn default() -> Self {
        Self {
            output_tco: false,
            output_payback: false,
            io_table_write_step: default_io_step(),
            combined_levels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub demand_measures: Vec<String>,
    #[serde(default)]
    pub supply_measures: Vec<String>,
}

impl ModelConfig {
    pub fn scenario(&self, id: &str) -> Option<&ScenarioDef> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Value-column label for cost tables, e.g. `2015 USD`.
    pub fn cost_unit(&self) -> String {
        format!("{} {}", self.case.currency_year, self.case.currency_name).to_uppercase()
    }

    pub fn mass_unit(&self) -> String {
        self.case.mass_unit.to_uppercase()
    }

    pub fn energy_unit(&self) -> String {
        self.case.energy_unit.to_uppercase()
    }

    pub fn combined_level(&self, level: &str) -> bool {
        self.output_detail.combined_levels.iter().any(|l| l == level)
    }
}
