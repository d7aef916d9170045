//! Replay engines backed by pre-computed tables.
//!
//! A recorded model is a JSON fixture holding what a demand and a supply
//! engine would produce. Replaying it drives the orchestrator end to end
//! without the simulation equations.

use std::path::Path;

use ep_accounting::EntityProfile;
use ep_project::ScenarioDef;
use ep_results::ResultSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ModelContext;
use crate::engines::{
    DemandEngine, DemandResults, EngineError, EngineResult, SupplyBuilder, SupplyEngine,
    SupplyLinks, SupplyResults,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedModel {
    pub demand: DemandFixture,
    pub supply: SupplyFixture,
}

impl RecordedModel {
    pub fn load_json(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::FixtureRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| AppError::Fixture {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn demand_engine(&self) -> RecordedDemand {
        RecordedDemand::new(self.demand.clone())
    }

    pub fn supply_builder(&self) -> RecordedSupplyBuilder {
        RecordedSupplyBuilder {
            fixture: self.supply.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandFixture {
    #[serde(default)]
    pub entities: Vec<EntityProfile>,
    /// Tables available once the demand side is solved.
    #[serde(default)]
    pub solved: DemandResults,
    /// Embodied and direct tables that appear when supply is linked back.
    #[serde(default)]
    pub linked: DemandResults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyFixture {
    #[serde(default)]
    pub results: SupplyResults,
    /// Year in which the convergence loop reports failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_in_year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDemand {
    fixture: DemandFixture,
    results: DemandResults,
    outputs: ResultSet,
    combined_geography: Option<String>,
}

impl RecordedDemand {
    pub fn new(fixture: DemandFixture) -> Self {
        Self {
            fixture,
            results: DemandResults::default(),
            outputs: ResultSet::new(),
            combined_geography: None,
        }
    }

    /// Engine already holding `results`, as if solved.
    pub fn solved(entities: Vec<EntityProfile>, results: DemandResults) -> Self {
        let mut engine = Self::new(DemandFixture {
            entities,
            solved: results.clone(),
            linked: DemandResults::default(),
        });
        engine.results = results;
        engine
    }

    fn check_link(&self, links: &SupplyLinks) -> EngineResult<()> {
        let Some(geo) = &self.combined_geography else {
            return Err(EngineError::Demand {
                message: "cannot link supply before the demand side is solved".to_string(),
            });
        };
        for (name, table) in [
            ("emissions", &links.emissions),
            ("demand_emissions_rates", &links.demand_emissions_rates),
            ("energy", &links.energy),
            ("cost", &links.cost),
        ] {
            if !table.has_dim(geo) {
                return Err(EngineError::Demand {
                    message: format!("{name} link is not keyed by {geo}"),
                });
            }
        }
        Ok(())
    }
}

impl DemandEngine for RecordedDemand {
    fn solve(&mut self, ctx: &ModelContext) -> EngineResult<()> {
        self.results = self.fixture.solved.clone();
        self.combined_geography = Some(ctx.combined_geography().to_string());

        for (name, table) in [
            ("d_energy", &self.results.energy),
            ("d_levelized_costs", &self.results.levelized_costs),
            ("d_sales", &self.results.sales),
        ] {
            if let Some(table) = table {
                self.outputs.insert(name, table.clone());
            }
        }
        debug!(tables = self.outputs.len(), "replayed demand solve");
        Ok(())
    }

    fn results(&self) -> &DemandResults {
        &self.results
    }

    fn outputs(&self) -> &ResultSet {
        &self.outputs
    }

    fn outputs_mut(&mut self) -> &mut ResultSet {
        &mut self.outputs
    }

    fn entities(&self) -> &[EntityProfile] {
        &self.fixture.entities
    }

    fn link_to_supply(&mut self, links: &SupplyLinks) -> EngineResult<()> {
        self.check_link(links)?;
        let linked = &self.fixture.linked;
        self.results.embodied_emissions = linked.embodied_emissions.clone();
        self.results.embodied_costs = linked.embodied_costs.clone();
        self.results.embodied_energy = linked.embodied_energy.clone();
        self.results.direct_emissions = linked.direct_emissions.clone();
        Ok(())
    }

    fn link_to_supply_tco(&mut self, links: &SupplyLinks) -> EngineResult<()> {
        self.check_link(links)?;
        self.results.embodied_costs_tco = self.fixture.linked.embodied_costs_tco.clone();
        Ok(())
    }

    fn link_to_supply_payback(&mut self, links: &SupplyLinks) -> EngineResult<()> {
        self.check_link(links)?;
        self.results.embodied_costs_payback = self.fixture.linked.embodied_costs_payback.clone();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSupply {
    fixture: SupplyFixture,
    results: SupplyResults,
    outputs: ResultSet,
    nodes_added: bool,
    measures: Vec<String>,
    initialized: bool,
    finalized: bool,
}

impl RecordedSupply {
    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    fn fail(message: &str) -> EngineError {
        EngineError::Supply {
            message: message.to_string(),
        }
    }
}

impl SupplyEngine for RecordedSupply {
    fn add_nodes(&mut self) -> EngineResult<()> {
        self.nodes_added = true;
        Ok(())
    }

    fn add_measures(&mut self, scenario: &ScenarioDef) -> EngineResult<()> {
        if !self.nodes_added {
            return Err(Self::fail("measures added before nodes"));
        }
        self.measures = scenario.supply_measures.clone();
        Ok(())
    }

    fn initial_calculate(&mut self) -> EngineResult<()> {
        if !self.nodes_added {
            return Err(Self::fail("initial calculation before nodes were added"));
        }
        self.initialized = true;
        Ok(())
    }

    fn calculate_loop(
        &mut self,
        years: &[i64],
        on_year: &mut dyn FnMut(i64),
    ) -> EngineResult<()> {
        if !self.initialized {
            return Err(Self::fail("calculation loop before initial calculation"));
        }
        for &year in years {
            if self.fixture.fail_in_year == Some(year) {
                return Err(EngineError::NotConverged { year });
            }
            debug!(year, "replayed supply year");
            on_year(year);
        }
        Ok(())
    }

    fn final_calculate(&mut self) -> EngineResult<()> {
        if !self.initialized {
            return Err(Self::fail("final calculation before initial calculation"));
        }
        self.results = self.fixture.results.clone();
        self.finalized = true;
        Ok(())
    }

    fn calculate_supply_outputs(&mut self) -> EngineResult<()> {
        if !self.finalized {
            return Err(Self::fail("supply outputs requested before final calculation"));
        }
        for (name, table) in [
            ("s_export_costs", &self.results.export_costs),
            ("s_export_emissions", &self.results.export_emissions),
            ("s_export_energy", &self.results.export_energy),
        ] {
            if let Some(table) = table {
                self.outputs.insert(name, table.clone());
            }
        }
        Ok(())
    }

    fn results(&self) -> &SupplyResults {
        &self.results
    }

    fn outputs(&self) -> &ResultSet {
        &self.outputs
    }
}

#[derive(Debug, Clone)]
pub struct RecordedSupplyBuilder {
    fixture: SupplyFixture,
}

impl RecordedSupplyBuilder {
    pub fn new(fixture: SupplyFixture) -> Self {
        Self { fixture }
    }
}

impl SupplyBuilder for RecordedSupplyBuilder {
    type Engine = RecordedSupply;

    fn build(&self, _scenario: &ScenarioDef, demand: &DemandResults) -> EngineResult<RecordedSupply> {
        if demand.energy_demand.is_none() {
            return Err(EngineError::MissingTable {
                name: "energy_demand".to_string(),
            });
        }
        Ok(RecordedSupply {
            fixture: self.fixture.clone(),
            results: SupplyResults::default(),
            outputs: ResultSet::new(),
            nodes_added: false,
            measures: Vec::new(),
            initialized: false,
            finalized: false,
        })
    }
}
