//! ep-geo: geography remapping between spatial granularities.
//!
//! The reconciliation engine only consumes the [`GeoMapper`] contract; the
//! correspondence table shipped here is the implementation used when the
//! mapping is declared in the model configuration.

pub mod correspondence;

pub use correspondence::CorrespondenceTable;

use core::fmt;
use ep_core::{EpError, KeyedDataset};
use serde::{Deserialize, Serialize};

pub type GeoResult<T> = Result<T, GeoError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] EpError),

    #[error("No known correspondence from {from} to {to}")]
    NoCorrespondence { from: String, to: String },

    #[error("Dataset has no '{geography}' dimension")]
    MissingDimension { geography: String },

    #[error("{geography} value '{value}' has no mapping to {to}")]
    Unmapped {
        geography: String,
        value: String,
        to: String,
    },

    #[error("Invalid weight {weight} for {from_value} -> {to_value}")]
    InvalidWeight {
        from_value: String,
        to_value: String,
        weight: f64,
    },
}

/// How values are carried across a geography boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemapMode {
    /// Rates: each target region receives a weighted average of its sources.
    Intensity,
    /// Totals: each source region's value is split across its targets.
    Total,
}

impl RemapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RemapMode::Intensity => "intensity",
            RemapMode::Total => "total",
        }
    }
}

impl fmt::Display for RemapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a dataset keyed by one geography into one keyed by another.
///
/// The result carries `to_geography` at the position `from_geography` held;
/// every other dimension is unchanged.
pub trait GeoMapper {
    fn geo_map(
        &self,
        dataset: &KeyedDataset,
        from_geography: &str,
        to_geography: &str,
        mode: RemapMode,
    ) -> GeoResult<KeyedDataset>;
}
