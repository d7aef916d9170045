//! Merge datasets that account for mutually exclusive slices of one quantity.
//!
//! Inputs rarely share a dimension set: export tables know nothing of demand
//! subsectors, direct demand tables know nothing of supply nodes. Every input
//! is lifted onto the union of all dimensions, with `N/A` standing in for the
//! dimensions it lacks, before the rows are stacked under a category key.

use core::fmt;
use std::collections::HashSet;

use ep_core::{Key, KeyedDataset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AccountingError, AccountingResult};

/// Accounting slice a set of rows belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoryKey {
    #[serde(rename = "EXPORTED")]
    Exported,
    #[serde(rename = "SUPPLY-SIDE")]
    SupplySide,
    #[serde(rename = "DEMAND-SIDE")]
    DemandSide,
}

impl CategoryKey {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKey::Exported => "EXPORTED",
            CategoryKey::SupplySide => "SUPPLY-SIDE",
            CategoryKey::DemandSide => "DEMAND-SIDE",
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical quantity being combined; decides the category dimension and sign rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Cost,
    Emissions,
    Energy,
}

impl Quantity {
    pub fn category_dim(self) -> &'static str {
        match self {
            Quantity::Cost => "cost type",
            Quantity::Emissions => "emissions type",
            Quantity::Energy => "energy type",
        }
    }

    /// Negative costs and emissions are numerical noise, not true negative flows.
    pub fn clamps_negative(self) -> bool {
        matches!(self, Quantity::Cost | Quantity::Emissions)
    }
}

/// Union of dimension names, in first-seen order across `inputs`.
pub fn union_dims(inputs: &[KeyedDataset]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dims = Vec::new();
    for ds in inputs {
        for d in ds.dims() {
            if seen.insert(d.as_str()) {
                dims.push(d.clone());
            }
        }
    }
    dims
}

/// Lift every input onto the union dimension set, in union order.
///
/// Missing dimensions are filled with the `N/A` sentinel and rows are
/// regrouped (summed) on the unified key. Inputs already carrying every
/// dimension are only reordered.
pub fn align(inputs: &[KeyedDataset]) -> AccountingResult<Vec<KeyedDataset>> {
    let union = union_dims(inputs);
    let order: Vec<&str> = union.iter().map(|d| d.as_str()).collect();

    let width = inputs.first().map(|ds| ds.columns().len());
    inputs
        .iter()
        .map(|ds| {
            if let Some(expected) = width
                && ds.columns().len() != expected
            {
                return Err(AccountingError::ColumnMismatch {
                    expected,
                    actual: ds.columns().len(),
                });
            }
            let mut lifted = ds.clone();
            for dim in &order {
                if !lifted.has_dim(dim) {
                    lifted = lifted.add_dim(dim, Key::not_applicable())?;
                }
            }
            Ok(lifted.group_sum(&order)?)
        })
        .collect()
}

/// Stacks aligned inputs under a category dimension.
#[derive(Debug, Clone)]
pub struct Combiner {
    category_dim: String,
    clamp_negative: bool,
}

impl Combiner {
    pub fn new(category_dim: impl Into<String>, clamp_negative: bool) -> Self {
        Self {
            category_dim: category_dim.into(),
            clamp_negative,
        }
    }

    pub fn for_quantity(quantity: Quantity) -> Self {
        Self::new(quantity.category_dim(), quantity.clamps_negative())
    }

    pub fn category_dim(&self) -> &str {
        &self.category_dim
    }

    /// Combine `(category, dataset)` pairs into one table.
    ///
    /// Absent datasets are skipped: their category simply has no rows. The
    /// category dimension leads the result; zero rows are dropped.
    pub fn combine(
        &self,
        inputs: Vec<(CategoryKey, Option<KeyedDataset>)>,
    ) -> AccountingResult<KeyedDataset> {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        let mut present = Vec::new();
        for (category, ds) in inputs {
            if !seen.insert(category) {
                return Err(AccountingError::DuplicateCategory {
                    category: category.to_string(),
                });
            }
            match ds {
                Some(ds) => {
                    labels.push(category);
                    present.push(ds);
                }
                None => debug!(%category, dim = %self.category_dim, "category absent, skipping"),
            }
        }

        if present.is_empty() {
            return Err(AccountingError::NoInputs {
                what: self.category_dim.clone(),
            });
        }

        let aligned = align(&present)?;
        let union = union_dims(&aligned);
        if union.contains(&self.category_dim) {
            return Err(AccountingError::CategoryDimCollision {
                dim: self.category_dim.clone(),
            });
        }

        let mut dims = Vec::with_capacity(union.len() + 1);
        dims.push(self.category_dim.clone());
        dims.extend(union);
        let mut out = KeyedDataset::from_layout(dims, aligned[0].columns().to_vec())?;

        for (category, ds) in labels.into_iter().zip(&aligned) {
            for (key, values) in ds.iter() {
                let mut k = Vec::with_capacity(key.len() + 1);
                k.push(Key::text(category.as_str()));
                k.extend_from_slice(key);
                out.insert(k, values.to_vec())?;
            }
        }

        if self.clamp_negative {
            out = out.clamp_negative();
        }
        Ok(out.drop_zero_rows())
    }
}
