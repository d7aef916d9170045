//! The Keyed Dataset: a numeric table addressed by named categorical dimensions.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::dims::VALUE;
use crate::error::{EpError, EpResult};
use crate::key::Key;
use crate::numeric::{Real, finite_or_zero};

/// Numeric table keyed by an ordered tuple of dimension values.
///
/// - every row carries one value per dimension, in `dims` order
/// - every row carries one value per column, in `columns` order
/// - keys are unique; rows iterate in key order
///
/// Operations return new datasets; the receiver is never modified except
/// through `insert`/`accumulate` while a table is being built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRepr", into = "DatasetRepr")]
pub struct KeyedDataset {
    dims: Vec<String>,
    columns: Vec<String>,
    rows: BTreeMap<Vec<Key>, Vec<Real>>,
}

/// Wire form. JSON maps need string keys, so rows travel as a list.
#[derive(Serialize, Deserialize)]
struct DatasetRepr {
    dims: Vec<String>,
    columns: Vec<String>,
    rows: Vec<(Vec<Key>, Vec<WireCell>)>,
}

/// JSON has no NaN or infinity; those cells travel as text.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireCell {
    Number(Real),
    Text(String),
}

const NAN_TEXT: &str = "NaN";
const INF_TEXT: &str = "inf";
const NEG_INF_TEXT: &str = "-inf";

impl From<Real> for WireCell {
    fn from(v: Real) -> Self {
        if v.is_finite() {
            WireCell::Number(v)
        } else if v.is_nan() {
            WireCell::Text(NAN_TEXT.to_string())
        } else if v > 0.0 {
            WireCell::Text(INF_TEXT.to_string())
        } else {
            WireCell::Text(NEG_INF_TEXT.to_string())
        }
    }
}

impl WireCell {
    fn into_real(self) -> EpResult<Real> {
        match self {
            WireCell::Number(v) => Ok(v),
            WireCell::Text(text) => match text.as_str() {
                NAN_TEXT => Ok(Real::NAN),
                INF_TEXT => Ok(Real::INFINITY),
                NEG_INF_TEXT => Ok(Real::NEG_INFINITY),
                _ => Err(EpError::InvalidArg {
                    what: "cell is neither a number nor NaN/inf/-inf",
                }),
            },
        }
    }
}

impl TryFrom<DatasetRepr> for KeyedDataset {
    type Error = EpError;

    fn try_from(repr: DatasetRepr) -> EpResult<Self> {
        let mut ds = KeyedDataset::from_layout(repr.dims, repr.columns)?;
        for (key, cells) in repr.rows {
            let values = cells
                .into_iter()
                .map(WireCell::into_real)
                .collect::<EpResult<Vec<_>>>()?;
            ds.insert(key, values)?;
        }
        Ok(ds)
    }
}

impl From<KeyedDataset> for DatasetRepr {
    fn from(ds: KeyedDataset) -> Self {
        DatasetRepr {
            dims: ds.dims,
            columns: ds.columns,
            rows: ds
                .rows
                .into_iter()
                .map(|(key, values)| (key, values.into_iter().map(WireCell::from).collect()))
                .collect(),
        }
    }
}

impl KeyedDataset {
    /// Empty dataset with the given dimensions and value columns.
    pub fn new(dims: &[&str], columns: &[&str]) -> EpResult<Self> {
        Self::from_layout(
            dims.iter().map(|d| d.to_string()).collect(),
            columns.iter().map(|c| c.to_string()).collect(),
        )
    }

    /// Empty dataset with a single `value` column.
    pub fn scalar(dims: &[&str]) -> EpResult<Self> {
        Self::new(dims, &[VALUE])
    }

    pub fn from_layout(dims: Vec<String>, columns: Vec<String>) -> EpResult<Self> {
        let mut seen = HashSet::new();
        for dim in &dims {
            if !seen.insert(dim.as_str()) {
                return Err(EpError::DuplicateDim { dim: dim.clone() });
            }
        }
        if columns.is_empty() {
            return Err(EpError::InvalidArg {
                what: "dataset needs at least one value column",
            });
        }
        Ok(Self {
            dims,
            columns,
            rows: BTreeMap::new(),
        })
    }

    /// Build a single-column dataset from `(key, value)` pairs.
    pub fn from_values<I>(dims: &[&str], rows: I) -> EpResult<Self>
    where
        I: IntoIterator<Item = (Vec<Key>, Real)>,
    {
        let mut ds = Self::scalar(dims)?;
        for (key, value) in rows {
            ds.insert(key, vec![value])?;
        }
        Ok(ds)
    }

    fn empty_like(&self) -> Self {
        Self {
            dims: self.dims.clone(),
            columns: self.columns.clone(),
            rows: BTreeMap::new(),
        }
    }

    fn check_row(&self, key: &[Key], values: &[Real]) -> EpResult<()> {
        if key.len() != self.dims.len() {
            return Err(EpError::KeyArity {
                expected: self.dims.len(),
                actual: key.len(),
            });
        }
        if values.len() != self.columns.len() {
            return Err(EpError::ValueWidth {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Insert a new row. Duplicate keys are rejected.
    pub fn insert(&mut self, key: Vec<Key>, values: Vec<Real>) -> EpResult<()> {
        self.check_row(&key, &values)?;
        if self.rows.contains_key(&key) {
            return Err(EpError::DuplicateKey {
                key: format!("{key:?}"),
            });
        }
        self.rows.insert(key, values);
        Ok(())
    }

    /// Insert a row, summing into an existing row with the same key.
    pub fn accumulate(&mut self, key: Vec<Key>, values: &[Real]) -> EpResult<()> {
        self.check_row(&key, values)?;
        match self.rows.get_mut(&key) {
            Some(existing) => {
                for (slot, v) in existing.iter_mut().zip(values) {
                    *slot += v;
                }
            }
            None => {
                self.rows.insert(key, values.to_vec());
            }
        }
        Ok(())
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[Key], &[Real])> {
        self.rows.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn get(&self, key: &[Key]) -> Option<&[Real]> {
        self.rows.get(key).map(|v| v.as_slice())
    }

    /// First-column value at `key`.
    pub fn value(&self, key: &[Key]) -> Option<Real> {
        self.get(key).and_then(|v| v.first().copied())
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dim_index(dim).is_some()
    }

    pub fn dim_index(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn require_dim(&self, dim: &str) -> EpResult<usize> {
        self.dim_index(dim).ok_or_else(|| EpError::UnknownDim {
            dim: dim.to_string(),
        })
    }

    /// Ordered distinct values appearing in `dim`.
    pub fn domain(&self, dim: &str) -> EpResult<Vec<Key>> {
        let idx = self.require_dim(dim)?;
        let values: BTreeSet<&Key> = self.rows.keys().map(|k| &k[idx]).collect();
        Ok(values.into_iter().cloned().collect())
    }

    /// Positions of `dims` within this dataset's dimension list.
    pub fn positions(&self, dims: &[String]) -> EpResult<Vec<usize>> {
        dims.iter().map(|d| self.require_dim(d)).collect()
    }

    /// Relabel value columns; the width must not change.
    pub fn with_columns(mut self, columns: Vec<String>) -> EpResult<Self> {
        if columns.len() != self.columns.len() {
            return Err(EpError::ValueWidth {
                expected: self.columns.len(),
                actual: columns.len(),
            });
        }
        self.columns = columns;
        Ok(self)
    }

    /// Append a dimension holding one constant value on every row.
    pub fn add_dim(&self, dim: &str, value: Key) -> EpResult<Self> {
        self.broadcast_dim(dim, std::slice::from_ref(&value))
    }

    /// Append a dimension and replicate every row across `values`.
    pub fn broadcast_dim(&self, dim: &str, values: &[Key]) -> EpResult<Self> {
        if self.has_dim(dim) {
            return Err(EpError::DuplicateDim {
                dim: dim.to_string(),
            });
        }
        let mut dims = self.dims.clone();
        dims.push(dim.to_string());
        let mut out = Self::from_layout(dims, self.columns.clone())?;
        for (key, row) in &self.rows {
            for value in values {
                let mut k = key.clone();
                k.push(value.clone());
                out.insert(k, row.clone())?;
            }
        }
        Ok(out)
    }

    pub fn rename_dim(&self, from: &str, to: &str) -> EpResult<Self> {
        let idx = self.require_dim(from)?;
        if from != to && self.has_dim(to) {
            return Err(EpError::DuplicateDim { dim: to.to_string() });
        }
        let mut out = self.clone();
        out.dims[idx] = to.to_string();
        Ok(out)
    }

    /// Remove a dimension, summing rows that collapse onto the same key.
    pub fn drop_dim(&self, dim: &str) -> EpResult<Self> {
        self.require_dim(dim)?;
        let keep: Vec<&str> = self
            .dims
            .iter()
            .filter(|d| d.as_str() != dim)
            .map(|d| d.as_str())
            .collect();
        self.group_sum(&keep)
    }

    /// Regroup onto `dims` (in that order), summing rows that collide.
    pub fn group_sum(&self, dims: &[&str]) -> EpResult<Self> {
        let owned: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let idx = self.positions(&owned)?;
        let mut out = Self::from_layout(owned, self.columns.clone())?;
        for (key, values) in &self.rows {
            let k: Vec<Key> = idx.iter().map(|&i| key[i].clone()).collect();
            out.accumulate(k, values)?;
        }
        Ok(out)
    }

    /// Permute dimensions; `dims` must name exactly the current set.
    pub fn reorder(&self, dims: &[&str]) -> EpResult<Self> {
        if dims.len() != self.dims.len() {
            return Err(EpError::DimMismatch {
                what: format!("cannot reorder {:?} as {:?}", self.dims, dims),
            });
        }
        let owned: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let idx = self.positions(&owned)?;
        let mut out = Self::from_layout(owned, self.columns.clone())?;
        for (key, values) in &self.rows {
            let k: Vec<Key> = idx.iter().map(|&i| key[i].clone()).collect();
            out.rows.insert(k, values.clone());
        }
        Ok(out)
    }

    /// Same rows laid out on `template`'s key set: rows missing here become NaN,
    /// rows absent from the template are dropped.
    pub fn reindex(&self, template: &KeyedDataset) -> EpResult<Self> {
        let dims: Vec<&str> = template.dims.iter().map(|d| d.as_str()).collect();
        let aligned = self.reorder(&dims)?;
        let mut out = aligned.empty_like();
        let missing = vec![Real::NAN; out.columns.len()];
        for key in template.rows.keys() {
            let values = aligned.rows.get(key).unwrap_or(&missing).clone();
            out.rows.insert(key.clone(), values);
        }
        Ok(out)
    }

    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&[Key], &[Real]) -> bool,
    {
        let mut out = self.empty_like();
        for (key, values) in &self.rows {
            if keep(key, values) {
                out.rows.insert(key.clone(), values.clone());
            }
        }
        out
    }

    /// Keep rows whose value in `dim` satisfies `keep`.
    pub fn filter_dim<F>(&self, dim: &str, mut keep: F) -> EpResult<Self>
    where
        F: FnMut(&Key) -> bool,
    {
        let idx = self.require_dim(dim)?;
        Ok(self.filter_rows(|key, _| keep(&key[idx])))
    }

    /// Keep rows whose integer value in `dim` is at least `min`.
    pub fn filter_at_least(&self, dim: &str, min: i64) -> EpResult<Self> {
        self.filter_dim(dim, |k| k.as_int().is_some_and(|v| v >= min))
    }

    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(Real) -> Real,
    {
        let mut out = self.clone();
        for values in out.rows.values_mut() {
            for v in values.iter_mut() {
                *v = f(*v);
            }
        }
        out
    }

    /// Negative cells become 0.
    pub fn clamp_negative(&self) -> Self {
        self.map_values(|v| if v < 0.0 { 0.0 } else { v })
    }

    /// NaN and +/-Inf cells become 0.
    pub fn normalize_non_finite(&self) -> Self {
        self.map_values(finite_or_zero)
    }

    /// Drop rows carrying any non-finite cell.
    pub fn drop_non_finite(&self) -> Self {
        self.filter_rows(|_, values| values.iter().all(|v| v.is_finite()))
    }

    /// Drop rows whose cells are all exactly zero.
    pub fn drop_zero_rows(&self) -> Self {
        self.filter_rows(|_, values| values.iter().any(|v| *v != 0.0))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn cells() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(
            prop_oneof![
                -50.0_f64..50.0,
                Just(0.0),
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
            ],
            0..24,
        )
    }

    fn build(values: &[f64]) -> KeyedDataset {
        KeyedDataset::from_values(
            &["row"],
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (vec![Key::Int(i as i64)], *v)),
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn cleaned_tables_are_finite_non_negative_and_sparse(values in cells()) {
            let cleaned = build(&values)
                .normalize_non_finite()
                .clamp_negative()
                .drop_zero_rows();
            for (_, row) in cleaned.iter() {
                prop_assert!(row[0].is_finite());
                prop_assert!(row[0] > 0.0);
            }
            let positives = values.iter().filter(|v| v.is_finite() && **v > 0.0).count();
            prop_assert_eq!(cleaned.len(), positives);
        }

        #[test]
        fn drop_non_finite_keeps_only_finite_rows(values in cells()) {
            let ds = build(&values).drop_non_finite();
            prop_assert!(ds.iter().all(|(_, row)| row[0].is_finite()));
            prop_assert_eq!(ds.len(), values.iter().filter(|v| v.is_finite()).count());
        }
    }
}
