//! Lifecycle accounting: per-vintage payback curves and levelized TCO.
//!
//! Annual flows tied to equipment are keyed by `vintage` (year installed) and
//! `year` (year of the flow). Payback curves re-key them by
//! `lifetime_year = year - vintage + 1` and accumulate per unit of stock sold.

use ep_core::dims::{LIFETIME_YEAR, UNIT, VINTAGE, YEAR};
use ep_core::{EpError, Key, KeyedDataset, Real};
use tracing::debug;

use crate::entity::UnitRegistry;
use crate::{AccountingError, AccountingResult};

#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    initial_vintage: i64,
    years: Vec<i64>,
    entity_dim: String,
}

impl LifecycleEngine {
    /// `years` is the modeled horizon; its first year bounds every vintage.
    pub fn new(years: &[i64], entity_dim: impl Into<String>) -> AccountingResult<Self> {
        let initial_vintage = years.iter().copied().min().ok_or(AccountingError::InvalidArg {
            what: "lifecycle horizon has no years",
        })?;
        Ok(Self {
            initial_vintage,
            years: years.to_vec(),
            entity_dim: entity_dim.into(),
        })
    }

    pub fn initial_vintage(&self) -> i64 {
        self.initial_vintage
    }

    /// Rows inside the horizon: `vintage >= initial`, `year >= initial`, `year >= vintage`.
    pub fn in_horizon(&self, flow: &KeyedDataset) -> AccountingResult<KeyedDataset> {
        let v = flow.require_dim(VINTAGE)?;
        let y = flow.require_dim(YEAR)?;
        let initial = self.initial_vintage;
        Ok(flow.filter_rows(|key, _| match (key[v].as_int(), key[y].as_int()) {
            (Some(vintage), Some(year)) => vintage >= initial && year >= initial && year >= vintage,
            _ => false,
        }))
    }

    /// Spread a per-vintage denominator across every modeled year.
    ///
    /// A basis keyed by `year` (year of sale) is read as keyed by `vintage`.
    pub fn broadcast_basis(&self, basis: &KeyedDataset) -> AccountingResult<KeyedDataset> {
        let by_vintage = if basis.has_dim(VINTAGE) {
            basis.clone()
        } else if basis.has_dim(YEAR) {
            basis.rename_dim(YEAR, VINTAGE)?
        } else {
            return Err(EpError::DimMismatch {
                what: "unit basis needs a year or vintage dimension".to_string(),
            }
            .into());
        };
        let years: Vec<Key> = self.years.iter().map(|y| Key::Int(*y)).collect();
        Ok(by_vintage
            .filter_at_least(VINTAGE, self.initial_vintage)?
            .broadcast_dim(YEAR, &years)?)
    }

    /// Cumulative per-unit curve over `lifetime_year`.
    ///
    /// Rows whose ratio is non-finite (no matching or zero stock) are dropped,
    /// rows of entities without a unit label are dropped, and so are rows
    /// whose cumulative value is exactly zero.
    pub fn accumulate(
        &self,
        annual_flow: &KeyedDataset,
        unit_basis: &KeyedDataset,
        units: &UnitRegistry,
        value_label: &str,
    ) -> AccountingResult<KeyedDataset> {
        let flow = self.in_horizon(annual_flow)?;
        let basis = self.broadcast_basis(unit_basis)?;

        let ratio = divide_projected(&flow, &basis)?
            .drop_non_finite()
            .normalize_non_finite();
        let labeled = units.label(&ratio, &self.entity_dim)?;
        let curve = cumulate_lifetime(&labeled)?.drop_zero_rows();

        debug!(
            flow_rows = annual_flow.len(),
            kept = curve.len(),
            label = value_label,
            "accumulated lifecycle curve"
        );
        relabel(curve, value_label)
    }

    /// Per-unit levelized ratio without accumulation (total cost of ownership).
    ///
    /// Any `unit` dimension on the basis is summed away before dividing.
    /// Non-finite ratios become 0 and negatives are clamped before zero rows
    /// are dropped.
    pub fn levelize(
        &self,
        flow: &KeyedDataset,
        service_demand: &KeyedDataset,
        units: &UnitRegistry,
        value_label: &str,
    ) -> AccountingResult<KeyedDataset> {
        let flow = flow.filter_at_least(VINTAGE, self.initial_vintage)?;
        let mut basis = service_demand.filter_at_least(VINTAGE, self.initial_vintage)?;
        if basis.has_dim(UNIT) {
            basis = basis.drop_dim(UNIT)?;
        }

        let ratio = divide_projected(&flow, &basis)?
            .normalize_non_finite()
            .clamp_negative();
        let labeled = units.label(&ratio, &self.entity_dim)?.drop_zero_rows();
        relabel(labeled, value_label)
    }
}

fn relabel(ds: KeyedDataset, label: &str) -> AccountingResult<KeyedDataset> {
    if ds.columns().len() != 1 {
        return Err(AccountingError::ColumnMismatch {
            expected: 1,
            actual: ds.columns().len(),
        });
    }
    Ok(ds.with_columns(vec![label.to_string()])?)
}

/// Divide every flow row by the basis row its key projects onto.
///
/// The basis may carry fewer dimensions than the flow (it is broadcast over
/// the rest) but never more. A flow key without a basis row yields NaN.
fn divide_projected(flow: &KeyedDataset, basis: &KeyedDataset) -> AccountingResult<KeyedDataset> {
    if basis.columns().len() != 1 {
        return Err(AccountingError::ColumnMismatch {
            expected: 1,
            actual: basis.columns().len(),
        });
    }
    let idx = flow.positions(basis.dims()).map_err(|_| EpError::DimMismatch {
        what: format!(
            "basis dimensions {:?} are not all present in flow {:?}",
            basis.dims(),
            flow.dims()
        ),
    })?;

    let mut out = KeyedDataset::from_layout(flow.dims().to_vec(), flow.columns().to_vec())?;
    let mut projected = Vec::with_capacity(idx.len());
    for (key, values) in flow.iter() {
        projected.clear();
        projected.extend(idx.iter().map(|&i| key[i].clone()));
        let denom = basis.value(&projected).unwrap_or(Real::NAN);
        out.insert(key.to_vec(), values.iter().map(|v| v / denom).collect())?;
    }
    Ok(out)
}

/// Replace `year` with `lifetime_year` and take running sums along it.
fn cumulate_lifetime(ds: &KeyedDataset) -> AccountingResult<KeyedDataset> {
    let v = ds.require_dim(VINTAGE)?;
    let y = ds.require_dim(YEAR)?;

    let mut dims: Vec<String> = ds.dims().iter().filter(|d| *d != YEAR).cloned().collect();
    dims.push(LIFETIME_YEAR.to_string());

    // Lifetime last, so each group's rows are contiguous and ascending.
    let mut by_lifetime = KeyedDataset::from_layout(dims.clone(), ds.columns().to_vec())?;
    for (key, values) in ds.iter() {
        let (Some(vintage), Some(year)) = (key[v].as_int(), key[y].as_int()) else {
            return Err(EpError::InvalidArg {
                what: "vintage and year must be integers",
            }
            .into());
        };
        let mut k: Vec<Key> = key
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != y)
            .map(|(_, k)| k.clone())
            .collect();
        k.push(Key::Int(year - vintage + 1));
        by_lifetime.insert(k, values.to_vec())?;
    }

    let mut out = KeyedDataset::from_layout(dims, ds.columns().to_vec())?;
    let mut group: Option<Vec<Key>> = None;
    let mut running = vec![0.0; ds.columns().len()];
    for (key, values) in by_lifetime.iter() {
        let prefix = &key[..key.len() - 1];
        if group.as_deref() != Some(prefix) {
            group = Some(prefix.to_vec());
            running.iter_mut().for_each(|r| *r = 0.0);
        }
        for (r, v) in running.iter_mut().zip(values) {
            *r += v;
        }
        out.insert(key.to_vec(), running.clone())?;
    }
    Ok(out)
}
