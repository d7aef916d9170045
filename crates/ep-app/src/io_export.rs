//! Input-output table export.

use ep_accounting::{assemble_io, io_snapshot_years};
use ep_core::KeyedDataset;
use tracing::debug;

use crate::context::ModelContext;
use crate::engines::SupplyResults;
use crate::error::{AppError, AppResult};

pub const IO_TABLE_NAME: &str = "s_io";

/// Sector block matrix at the configured snapshot years.
pub fn io_table(ctx: &ModelContext, supply: &SupplyResults) -> AppResult<KeyedDataset> {
    if supply.demand_sectors.is_empty() {
        return Err(AppError::InvalidInput(
            "supply side reported no demand sectors".to_string(),
        ));
    }
    let years = io_snapshot_years(ctx.years(), ctx.config().output_detail.io_table_write_step)?;
    debug!(?years, sectors = supply.demand_sectors.len(), "assembling io table");
    Ok(assemble_io(&supply.io_tables, &supply.demand_sectors, &years)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::testing::test_context;
    use ep_core::key;

    fn row_table(value: f64) -> KeyedDataset {
        KeyedDataset::from_values(&["final_energy"], [(key!["electricity"], value)]).unwrap()
    }

    #[test]
    fn io_table_covers_snapshot_years() {
        let ctx = test_context(&[]);
        let mut io_tables = BTreeMap::new();
        for year in [2020, 2022] {
            let mut by_sector = BTreeMap::new();
            by_sector.insert("residential".to_string(), row_table(1.0));
            by_sector.insert("transport".to_string(), row_table(2.0));
            io_tables.insert(year, by_sector);
        }
        let supply = SupplyResults {
            demand_sectors: vec!["residential".to_string(), "transport".to_string()],
            io_tables,
            ..Default::default()
        };

        let io = io_table(&ctx, &supply).unwrap();
        assert_eq!(io.dims(), ["year", "sector", "final_energy", "column_sector"]);
        assert_eq!(
            io.value(&key![2022, "transport", "electricity", "transport"]),
            Some(2.0)
        );
        assert_eq!(
            io.value(&key![2020, "transport", "electricity", "residential"]),
            Some(0.0)
        );
        assert_eq!(io.len(), 8);
    }

    #[test]
    fn missing_snapshot_year_is_an_error() {
        let ctx = test_context(&[]);
        let mut by_sector = BTreeMap::new();
        by_sector.insert("residential".to_string(), row_table(1.0));
        let supply = SupplyResults {
            demand_sectors: vec!["residential".to_string()],
            io_tables: BTreeMap::from([(2020, by_sector)]),
            ..Default::default()
        };
        assert!(io_table(&ctx, &supply).is_err());
    }
}
