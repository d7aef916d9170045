//! Sector-by-sector input-output snapshots.

use std::collections::BTreeMap;

use ep_core::dims::{COLUMN_SECTOR, SECTOR, YEAR};
use ep_core::{Key, KeyedDataset};
use tracing::debug;

use crate::{AccountingError, AccountingResult};

/// Snapshot years for the IO table: the first modeled year plus every
/// `step`-th year counting back from the last.
pub fn io_snapshot_years(years: &[i64], step: i64) -> AccountingResult<Vec<i64>> {
    if step < 1 {
        return Err(AccountingError::InvalidArg {
            what: "io table write step must be at least 1",
        });
    }
    let (Some(&first), Some(&last)) = (years.iter().min(), years.iter().max()) else {
        return Ok(Vec::new());
    };
    let mut out = vec![first];
    let mut year = last;
    while year > first {
        out.push(year);
        year -= step;
    }
    out.sort_unstable();
    Ok(out)
}

/// Block matrix keyed by `[year, sector, <table dims>, column_sector]`.
///
/// `tables[year][sector]` is the sector's row table for that year; every
/// sector table must share one layout. Each table is replicated under every
/// column sector and blocks off the diagonal (`sector != column_sector`) are
/// zeroed. Zeroed rows are kept so the grid stays complete.
pub fn assemble_io(
    tables: &BTreeMap<i64, BTreeMap<String, KeyedDataset>>,
    sectors: &[String],
    years: &[i64],
) -> AccountingResult<KeyedDataset> {
    let first = sectors.first().ok_or(AccountingError::InvalidArg {
        what: "io table needs at least one sector",
    })?;
    let template = years
        .first()
        .map(|y| lookup(tables, *y, first))
        .transpose()?
        .ok_or(AccountingError::InvalidArg {
            what: "io table needs at least one snapshot year",
        })?;

    let mut dims = vec![YEAR.to_string(), SECTOR.to_string()];
    dims.extend(template.dims().iter().cloned());
    dims.push(COLUMN_SECTOR.to_string());
    let mut out = KeyedDataset::from_layout(dims, template.columns().to_vec())?;
    let zeros = vec![0.0; template.columns().len()];

    for &year in years {
        for row_sector in sectors {
            let table = lookup(tables, year, row_sector)?;
            if table.dims() != template.dims() || table.columns() != template.columns() {
                return Err(AccountingError::IoLayoutMismatch {
                    sector: row_sector.clone(),
                });
            }
            for (key, values) in table.iter() {
                for col_sector in sectors {
                    let mut k = Vec::with_capacity(key.len() + 3);
                    k.push(Key::Int(year));
                    k.push(Key::text(row_sector.as_str()));
                    k.extend(key.iter().cloned());
                    k.push(Key::text(col_sector.as_str()));
                    let cells = if row_sector == col_sector {
                        values.to_vec()
                    } else {
                        zeros.clone()
                    };
                    out.insert(k, cells)?;
                }
            }
        }
    }

    debug!(
        years = years.len(),
        sectors = sectors.len(),
        rows = out.len(),
        "assembled io snapshot"
    );
    Ok(out)
}

fn lookup<'a>(
    tables: &'a BTreeMap<i64, BTreeMap<String, KeyedDataset>>,
    year: i64,
    sector: &str,
) -> AccountingResult<&'a KeyedDataset> {
    tables
        .get(&year)
        .and_then(|by_sector| by_sector.get(sector))
        .ok_or_else(|| AccountingError::MissingIoTable {
            year,
            sector: sector.to_string(),
        })
}
