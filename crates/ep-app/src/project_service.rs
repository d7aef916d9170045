//! Configuration loading, validation, and introspection.

use std::path::Path;

use ep_project::{ModelConfig, ScenarioDef};
use ep_results::{CheckpointManifest, CheckpointStore};

use crate::error::{AppError, AppResult};

/// Summary of a scenario for listing.
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub demand_measure_count: usize,
    pub supply_measure_count: usize,
}

/// Load a model configuration; `.json` files are read as JSON, anything else as YAML.
pub fn load_config(path: &Path) -> AppResult<ModelConfig> {
    Ok(ep_project::load_config(path)?)
}

pub fn save_config(path: &Path, config: &ModelConfig) -> AppResult<()> {
    ep_project::save_config(path, config)?;
    Ok(())
}

pub fn validate_config(config: &ModelConfig) -> AppResult<()> {
    ep_project::validate_config(config)
        .map_err(|e| AppError::Project(format!("Invalid configuration: {}", e)))
}

pub fn list_scenarios(config: &ModelConfig) -> Vec<ScenarioSummary> {
    config
        .scenarios
        .iter()
        .map(|scenario| ScenarioSummary {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            demand_measure_count: scenario.demand_measures.len(),
            supply_measure_count: scenario.supply_measures.len(),
        })
        .collect()
}

pub fn get_scenario<'a>(config: &'a ModelConfig, scenario_id: &str) -> AppResult<&'a ScenarioDef> {
    config
        .scenario(scenario_id)
        .ok_or_else(|| AppError::ScenarioNotFound(scenario_id.to_string()))
}

/// Checkpoints saved under the configuration's working directory.
pub fn list_checkpoints(config_path: &Path) -> AppResult<Vec<CheckpointManifest>> {
    let config = load_config(config_path)?;
    let working_dir = ep_project::resolve_working_dir(config_path, &config);
    Ok(CheckpointStore::for_working_dir(&working_dir)?.list()?)
}
