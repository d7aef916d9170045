//! ep-core: stable foundation for the pathways reconciliation engine.
//!
//! Contains:
//! - dataset (the Keyed Dataset: numeric cells addressed by named categorical dimensions)
//! - key (dimension values)
//! - dims (well-known dimension names)
//! - numeric (Real + non-finite cleanup)
//! - error (shared error types)

pub mod dataset;
pub mod dims;
pub mod error;
pub mod key;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use dataset::KeyedDataset;
pub use error::{EpError, EpResult};
pub use key::Key;
pub use numeric::*;
