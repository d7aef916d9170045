//! Shared application service layer for the pathways model.
//!
//! This crate sequences the demand and supply engines for one scenario,
//! reconciles their results into combined emissions, cost and energy
//! tables, and owns checkpointing and result export. Frontends drive it
//! through [`run_service`] and [`project_service`].

pub mod combined;
pub mod context;
pub mod engines;
pub mod error;
pub mod io_export;
pub mod orchestrator;
pub mod payback;
pub mod phase;
pub mod progress;
pub mod project_service;
pub mod recorded;
pub mod run_service;

// Re-export key types for convenience
pub use context::{ModelContext, ProjectScenarioLoader, ScenarioLoader};
pub use engines::{
    DemandEngine, DemandResults, EngineError, SupplyBuilder, SupplyEngine, SupplyLinks,
    SupplyResults,
};
pub use error::{AppError, AppResult};
pub use orchestrator::{ModelSnapshot, PathwaysModel, RunFlags, RunTimingSummary};
pub use phase::Phase;
pub use progress::{RunProgressEvent, RunStage, SupplyProgress};
pub use project_service::{
    ScenarioSummary, get_scenario, list_checkpoints, list_scenarios, load_config, save_config,
    validate_config,
};
pub use recorded::{RecordedDemand, RecordedModel, RecordedSupply, RecordedSupplyBuilder};
pub use run_service::{RecordedPathwaysModel, RunRequest, RunResponse, run_scenario, run_scenario_with_progress};

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use ep_core::{Key, KeyedDataset};
    use ep_project::{
        CaseDef, CorrespondenceDef, CorrespondenceRowDef, GeographyDef, ModelConfig,
        OutputDetailDef,
    };

    use crate::context::ModelContext;

    /// Dataset whose last dimension is `year`.
    pub fn ds(dims: &[&str], rows: &[(&[&str], i64, f64)]) -> KeyedDataset {
        KeyedDataset::from_values(
            dims,
            rows.iter().map(|(keys, year, value)| {
                let mut key: Vec<Key> = keys.iter().map(|k| Key::text(*k)).collect();
                key.push(Key::Int(*year));
                (key, *value)
            }),
        )
        .unwrap()
    }

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("ep-app-unit-{nanos}"))
    }

    pub fn test_config(levels: &[&str]) -> ModelConfig {
        ModelConfig {
            version: 1,
            name: "unit".to_string(),
            working_dir: PathBuf::from("."),
            case: CaseDef {
                author: String::new(),
                currency_year: 2015,
                currency_name: "usd".to_string(),
                mass_unit: "tonne".to_string(),
                energy_unit: "mmbtu".to_string(),
                current_year: 2020,
            },
            geography: GeographyDef {
                demand_primary: "state".to_string(),
                supply_primary: "zone".to_string(),
                combined_outputs: "state".to_string(),
                correspondences: vec![CorrespondenceDef {
                    from: "state".to_string(),
                    to: "zone".to_string(),
                    rows: vec![
                        CorrespondenceRowDef {
                            from: Key::text("north"),
                            to: Key::text("grid"),
                            weight: 3.0,
                        },
                        CorrespondenceRowDef {
                            from: Key::text("south"),
                            to: Key::text("grid"),
                            weight: 1.0,
                        },
                    ],
                }],
            },
            supply_years: vec![2020, 2021, 2022],
            output_detail: OutputDetailDef {
                combined_levels: levels.iter().map(|l| l.to_string()).collect(),
                ..OutputDetailDef::default()
            },
            scenarios: Vec::new(),
        }
    }

    pub fn test_context(levels: &[&str]) -> ModelContext {
        ModelContext::from_config(test_config(levels), unique_temp_dir())
            .unwrap()
            .with_timestamp("2026-01-01 00:00")
    }
}
