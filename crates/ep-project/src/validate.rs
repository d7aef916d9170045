//! Configuration validation.

use std::collections::HashSet;

use crate::schema::{CorrespondenceDef, ModelConfig};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_config(config: &ModelConfig) -> Result<(), ValidationError> {
    if config.version == 0 || config.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    if config.supply_years.is_empty() {
        return Err(invalid("supply_years", "[]", "at least one year is required"));
    }
    for pair in config.supply_years.windows(2) {
        if pair[1] <= pair[0] {
            return Err(invalid(
                "supply_years",
                &format!("{}, {}", pair[0], pair[1]),
                "years must be strictly increasing",
            ));
        }
    }

    if config.output_detail.io_table_write_step < 1 {
        return Err(invalid(
            "output_detail.io_table_write_step",
            &config.output_detail.io_table_write_step.to_string(),
            "must be at least 1",
        ));
    }

    let geo = &config.geography;
    for (field, value) in [
        ("geography.demand_primary", &geo.demand_primary),
        ("geography.supply_primary", &geo.supply_primary),
        ("geography.combined_outputs", &geo.combined_outputs),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(field, value, "geography name must not be empty"));
        }
    }

    let mut pairs = HashSet::new();
    for corr in &geo.correspondences {
        if !pairs.insert((corr.from.as_str(), corr.to.as_str())) {
            return Err(ValidationError::DuplicateId {
                id: format!("{} -> {}", corr.from, corr.to),
                context: "geography.correspondences".to_string(),
            });
        }
        validate_correspondence(corr)?;
    }

    for (from, to) in [
        (&geo.demand_primary, &geo.combined_outputs),
        (&geo.supply_primary, &geo.combined_outputs),
    ] {
        let declared = from == to
            || pairs.contains(&(from.as_str(), to.as_str()))
            || pairs.contains(&(to.as_str(), from.as_str()));
        if !declared {
            return Err(ValidationError::MissingReference {
                id: format!("{from} -> {to}"),
                context: "geography.correspondences".to_string(),
            });
        }
    }

    let mut ids = HashSet::new();
    for scenario in &config.scenarios {
        if scenario.id.trim().is_empty() {
            return Err(invalid("scenarios.id", &scenario.id, "must not be empty"));
        }
        if !ids.insert(scenario.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: scenario.id.clone(),
                context: "scenarios".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_correspondence(corr: &CorrespondenceDef) -> Result<(), ValidationError> {
    if corr.from == corr.to {
        return Err(invalid(
            "geography.correspondences",
            &corr.from,
            "a geography cannot map onto itself",
        ));
    }
    for row in &corr.rows {
        if !row.weight.is_finite() || row.weight < 0.0 {
            return Err(invalid(
                "geography.correspondences.weight",
                &row.weight.to_string(),
                "weights must be finite and non-negative",
            ));
        }
    }
    Ok(())
}

fn invalid(field: &str, value: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
