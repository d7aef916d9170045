//! Contracts of the demand and supply simulation engines.
//!
//! The engines produce the raw projections; this crate only sequences them
//! and reconciles what they expose.

use std::collections::BTreeMap;

use ep_accounting::EntityProfile;
use ep_core::{EpError, KeyedDataset};
use ep_project::ScenarioDef;
use ep_results::ResultSet;
use serde::{Deserialize, Serialize};

use crate::context::ModelContext;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Demand engine failed: {message}")]
    Demand { message: String },

    #[error("Supply engine failed: {message}")]
    Supply { message: String },

    #[error("Supply did not converge in {year}")]
    NotConverged { year: i64 },

    #[error("Engine did not produce table '{name}'")]
    MissingTable { name: String },

    #[error("Dataset error: {0}")]
    Dataset(#[from] EpError),
}

/// Tables the demand side exposes for reconciliation.
///
/// `embodied_*` and `direct_emissions` are keyed by the combined-output
/// geography and only exist after the supply results were linked back.
/// The remaining tables are keyed by the demand geography.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandResults {
    pub embodied_emissions: Option<KeyedDataset>,
    pub embodied_costs: Option<KeyedDataset>,
    pub embodied_energy: Option<KeyedDataset>,
    pub embodied_costs_tco: Option<KeyedDataset>,
    pub embodied_costs_payback: Option<KeyedDataset>,
    pub direct_emissions: Option<KeyedDataset>,

    pub levelized_costs: Option<KeyedDataset>,
    pub energy: Option<KeyedDataset>,
    /// Units sold per year of sale.
    pub sales: Option<KeyedDataset>,
    pub annual_costs_payback: Option<KeyedDataset>,
    pub energy_payback: Option<KeyedDataset>,
    pub levelized_costs_tco: Option<KeyedDataset>,
    pub service_demand_tco: Option<KeyedDataset>,
    pub electricity_reconciliation: Option<KeyedDataset>,
    /// Final energy demand handed to the supply side.
    pub energy_demand: Option<KeyedDataset>,
}

/// Supply tables remapped to the combined-output geography.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyLinks {
    pub emissions: KeyedDataset,
    pub demand_emissions_rates: KeyedDataset,
    pub energy: KeyedDataset,
    pub cost: KeyedDataset,
}

/// Tables the supply side exposes, keyed by the supply geography.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyResults {
    pub export_costs: Option<KeyedDataset>,
    pub export_emissions: Option<KeyedDataset>,
    pub export_energy: Option<KeyedDataset>,

    pub emissions_demand_link: Option<KeyedDataset>,
    pub demand_emissions_rates: Option<KeyedDataset>,
    pub energy_demand_link: Option<KeyedDataset>,
    pub cost_demand_link: Option<KeyedDataset>,

    pub demand_sectors: Vec<String>,
    /// `io_tables[year][sector]`: the sector's row of the input-output table.
    pub io_tables: BTreeMap<i64, BTreeMap<String, KeyedDataset>>,
}

pub trait DemandEngine {
    fn solve(&mut self, ctx: &ModelContext) -> EngineResult<()>;

    fn results(&self) -> &DemandResults;

    /// Tables written to the demand output folder.
    fn outputs(&self) -> &ResultSet;

    fn outputs_mut(&mut self) -> &mut ResultSet;

    fn entities(&self) -> &[EntityProfile];

    fn link_to_supply(&mut self, links: &SupplyLinks) -> EngineResult<()>;

    fn link_to_supply_tco(&mut self, links: &SupplyLinks) -> EngineResult<()>;

    fn link_to_supply_payback(&mut self, links: &SupplyLinks) -> EngineResult<()>;
}

pub trait SupplyEngine {
    fn add_nodes(&mut self) -> EngineResult<()>;

    fn add_measures(&mut self, scenario: &ScenarioDef) -> EngineResult<()>;

    fn initial_calculate(&mut self) -> EngineResult<()>;

    /// Iterate the per-year convergence loop, reporting each converged year.
    fn calculate_loop(&mut self, years: &[i64], on_year: &mut dyn FnMut(i64))
    -> EngineResult<()>;

    fn final_calculate(&mut self) -> EngineResult<()>;

    fn calculate_supply_outputs(&mut self) -> EngineResult<()>;

    fn results(&self) -> &SupplyResults;

    /// Tables written to the supply output folder.
    fn outputs(&self) -> &ResultSet;
}

/// Builds a supply engine bound to a solved demand side.
pub trait SupplyBuilder {
    type Engine: SupplyEngine;

    fn build(&self, scenario: &ScenarioDef, demand: &DemandResults) -> EngineResult<Self::Engine>;
}

/// Fetch a table the engine was required to produce.
pub fn required<'a>(table: &'a Option<KeyedDataset>, name: &str) -> EngineResult<&'a KeyedDataset> {
    table.as_ref().ok_or_else(|| EngineError::MissingTable {
        name: name.to_string(),
    })
}
