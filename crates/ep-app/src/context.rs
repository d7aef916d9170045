//! Explicit run context: configuration, geography mapping, output locations.

use std::path::{Path, PathBuf};

use ep_core::KeyedDataset;
use ep_geo::{CorrespondenceTable, GeoMapper, RemapMode};
use ep_project::{ModelConfig, ScenarioDef};
use ep_results::{CheckpointStore, OutputSink};

use crate::error::{AppError, AppResult};

/// Source of scenario definitions.
///
/// Resuming from a demand checkpoint to re-run supply reloads the scenario,
/// so edited supply measures are picked up.
pub trait ScenarioLoader {
    fn load(&self, scenario_id: &str) -> AppResult<ScenarioDef>;
}

/// Scenarios held by the configuration the context was built from.
pub struct ConfigScenarios {
    scenarios: Vec<ScenarioDef>,
}

impl ScenarioLoader for ConfigScenarios {
    fn load(&self, scenario_id: &str) -> AppResult<ScenarioDef> {
        self.scenarios
            .iter()
            .find(|s| s.id == scenario_id)
            .cloned()
            .ok_or_else(|| AppError::ScenarioNotFound(scenario_id.to_string()))
    }
}

/// Re-reads the configuration file on every load.
pub struct ProjectScenarioLoader {
    path: PathBuf,
}

impl ProjectScenarioLoader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ScenarioLoader for ProjectScenarioLoader {
    fn load(&self, scenario_id: &str) -> AppResult<ScenarioDef> {
        Ok(ep_project::load_scenario(&self.path, scenario_id)?)
    }
}

/// Built once per run and passed by reference; read-only while the model runs.
pub struct ModelContext {
    config: ModelConfig,
    working_dir: PathBuf,
    timestamp: String,
    geo: Box<dyn GeoMapper>,
    scenarios: Box<dyn ScenarioLoader>,
}

impl ModelContext {
    pub fn new(
        config: ModelConfig,
        working_dir: PathBuf,
        geo: Box<dyn GeoMapper>,
        scenarios: Box<dyn ScenarioLoader>,
    ) -> AppResult<Self> {
        if config.supply_years.is_empty() {
            return Err(AppError::InvalidInput(
                "configuration has no supply years".to_string(),
            ));
        }
        Ok(Self {
            config,
            working_dir,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            geo,
            scenarios,
        })
    }

    /// Context backed by the configuration's own correspondences and scenarios.
    pub fn from_config(config: ModelConfig, working_dir: PathBuf) -> AppResult<Self> {
        let geo = correspondence_table(&config)?;
        let scenarios = ConfigScenarios {
            scenarios: config.scenarios.clone(),
        };
        Self::new(config, working_dir, Box::new(geo), Box::new(scenarios))
    }

    pub fn with_scenario_loader(mut self, loader: Box<dyn ScenarioLoader>) -> Self {
        self.scenarios = loader;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn years(&self) -> &[i64] {
        &self.config.supply_years
    }

    pub fn demand_geography(&self) -> &str {
        &self.config.geography.demand_primary
    }

    pub fn supply_geography(&self) -> &str {
        &self.config.geography.supply_primary
    }

    pub fn combined_geography(&self) -> &str {
        &self.config.geography.combined_outputs
    }

    pub fn geo_map(
        &self,
        dataset: &KeyedDataset,
        from_geography: &str,
        to_geography: &str,
        mode: RemapMode,
    ) -> AppResult<KeyedDataset> {
        Ok(self
            .geo
            .geo_map(dataset, from_geography, to_geography, mode)?)
    }

    pub fn load_scenario(&self, scenario_id: &str) -> AppResult<ScenarioDef> {
        self.scenarios.load(scenario_id)
    }

    pub fn output_sink(&self, scenario_name: &str) -> OutputSink {
        OutputSink::new(self.working_dir.clone(), scenario_name, self.timestamp.clone())
    }

    pub fn checkpoint_store(&self) -> AppResult<CheckpointStore> {
        Ok(CheckpointStore::for_working_dir(&self.working_dir)?)
    }
}

/// Correspondence table holding every mapping the configuration declares.
pub fn correspondence_table(config: &ModelConfig) -> AppResult<CorrespondenceTable> {
    let mut table = CorrespondenceTable::new();
    for corr in &config.geography.correspondences {
        table.add(
            &corr.from,
            &corr.to,
            corr.rows
                .iter()
                .map(|r| (r.from.clone(), r.to.clone(), r.weight)),
        )?;
    }
    Ok(table)
}
