//! ep-project: model configuration file format and validation.

pub mod schema;
pub mod validate;

use std::path::{Path, PathBuf};

pub use schema::*;
pub use validate::{LATEST_VERSION, ValidationError, validate_config};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown scenario: {id}")]
    UnknownScenario { id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ProjectResult<ModelConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ModelConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &ModelConfig) -> ProjectResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<ModelConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ModelConfig = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn save_json(path: &Path, config: &ModelConfig) -> ProjectResult<()> {
    validate_config(config)?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a config as JSON when the file ends in `.json`, YAML otherwise.
pub fn load_config(path: &Path) -> ProjectResult<ModelConfig> {
    if is_json(path) {
        load_json(path)
    } else {
        load_yaml(path)
    }
}

pub fn save_config(path: &Path, config: &ModelConfig) -> ProjectResult<()> {
    if is_json(path) {
        save_json(path, config)
    } else {
        save_yaml(path, config)
    }
}

/// Re-read `path` and return the named scenario as currently written.
pub fn load_scenario(path: &Path, id: &str) -> ProjectResult<ScenarioDef> {
    let config = load_config(path)?;
    config
        .scenario(id)
        .cloned()
        .ok_or_else(|| ProjectError::UnknownScenario { id: id.to_string() })
}

/// Working directory with relative paths resolved against the config file's folder.
pub fn resolve_working_dir(config_path: &Path, config: &ModelConfig) -> PathBuf {
    if config.working_dir.is_absolute() {
        return config.working_dir.clone();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.working_dir)
}
