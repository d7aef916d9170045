//! ep-accounting: reconciliation of demand- and supply-side result tables.
//!
//! - combine: merge mutually exclusive accounting categories into one table
//! - lifecycle: per-vintage cumulative payback curves and levelized TCO
//! - io_block: sector-by-sector snapshot matrices
//! - entity: demand entity classification and unit labels

pub mod combine;
pub mod entity;
pub mod io_block;
pub mod lifecycle;

pub use combine::{CategoryKey, Combiner, Quantity, align, union_dims};
pub use entity::{EntityKind, EntityProfile, LifecycleBasis, UnitRegistry};
pub use io_block::{assemble_io, io_snapshot_years};
pub use lifecycle::LifecycleEngine;

use ep_core::EpError;

pub type AccountingResult<T> = Result<T, AccountingError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AccountingError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] EpError),

    #[error("Nothing to combine: every {what} input is absent")]
    NoInputs { what: String },

    #[error("Category {category} given more than once")]
    DuplicateCategory { category: String },

    #[error("Category dimension '{dim}' already present in inputs")]
    CategoryDimCollision { dim: String },

    #[error("Value column width mismatch (expected={expected}, got={actual})")]
    ColumnMismatch { expected: usize, actual: usize },

    #[error("No IO table for sector {sector} in {year}")]
    MissingIoTable { year: i64, sector: String },

    #[error("IO table for sector {sector} does not match the layout of the other sectors")]
    IoLayoutMismatch { sector: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
