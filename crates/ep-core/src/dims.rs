//! Well-known dimension names and sentinel values.

pub const YEAR: &str = "year";
pub const VINTAGE: &str = "vintage";
pub const LIFETIME_YEAR: &str = "lifetime_year";
pub const UNIT: &str = "unit";
pub const SECTOR: &str = "sector";
pub const COLUMN_SECTOR: &str = "column_sector";
pub const SUBSECTOR: &str = "subsector";
pub const FINAL_ENERGY: &str = "final_energy";
pub const SUPPLY_NODE_EXPORT: &str = "supply_node_export";
pub const EXPORT_DOMESTIC: &str = "export/domestic";
pub const SUPPLY_DEMAND: &str = "supply/demand";
pub const ENERGY_ACCOUNTING: &str = "energy accounting";

/// Default value column of a freshly produced dataset.
pub const VALUE: &str = "value";

/// Placeholder for a dimension a dataset does not carry.
pub const NOT_APPLICABLE: &str = "N/A";
