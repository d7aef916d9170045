//! Weighted correspondence tables between named geographies.

use std::collections::BTreeMap;

use ep_core::{Key, KeyedDataset, Real};
use tracing::debug;

use crate::{GeoError, GeoMapper, GeoResult, RemapMode};

/// Overlap weights between the regions of two geographies.
///
/// A weight is any non-negative measure of overlap (area, population,
/// floor space). Only ratios of weights matter.
#[derive(Debug, Clone, Default)]
struct Correspondence {
    weights: BTreeMap<(Key, Key), Real>,
}

impl Correspondence {
    fn transposed(&self) -> Self {
        Self {
            weights: self
                .weights
                .iter()
                .map(|((f, t), w)| ((t.clone(), f.clone()), *w))
                .collect(),
        }
    }

    /// Per-source shares: for each source region, `(target, fraction)` pairs.
    fn shares(&self, mode: RemapMode) -> BTreeMap<Key, Vec<(Key, Real)>> {
        let mut denom: BTreeMap<&Key, Real> = BTreeMap::new();
        for ((f, t), w) in &self.weights {
            let k = match mode {
                RemapMode::Total => f,
                RemapMode::Intensity => t,
            };
            *denom.entry(k).or_insert(0.0) += w;
        }

        let mut shares: BTreeMap<Key, Vec<(Key, Real)>> = BTreeMap::new();
        for ((f, t), w) in &self.weights {
            let k = match mode {
                RemapMode::Total => f,
                RemapMode::Intensity => t,
            };
            let d = denom.get(k).copied().unwrap_or(0.0);
            let entry = shares.entry(f.clone()).or_default();
            if d > 0.0 && *w > 0.0 {
                entry.push((t.clone(), w / d));
            }
        }
        shares
    }
}

/// Table-backed [`GeoMapper`].
///
/// Registering `A -> B` also answers `B -> A` through the transposed weights.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceTable {
    maps: BTreeMap<(String, String), Correspondence>,
}

impl CorrespondenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register overlap weights `(from_value, to_value, weight)` between two geographies.
    pub fn add<I>(&mut self, from_geography: &str, to_geography: &str, rows: I) -> GeoResult<()>
    where
        I: IntoIterator<Item = (Key, Key, Real)>,
    {
        let corr = self
            .maps
            .entry((from_geography.to_string(), to_geography.to_string()))
            .or_default();
        for (from_value, to_value, weight) in rows {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GeoError::InvalidWeight {
                    from_value: from_value.to_string(),
                    to_value: to_value.to_string(),
                    weight,
                });
            }
            *corr.weights.entry((from_value, to_value)).or_insert(0.0) += weight;
        }
        Ok(())
    }

    pub fn knows(&self, from_geography: &str, to_geography: &str) -> bool {
        from_geography == to_geography
            || self.lookup(from_geography, to_geography).is_some()
    }

    fn lookup(&self, from: &str, to: &str) -> Option<Correspondence> {
        if let Some(c) = self.maps.get(&(from.to_string(), to.to_string())) {
            return Some(c.clone());
        }
        self.maps
            .get(&(to.to_string(), from.to_string()))
            .map(Correspondence::transposed)
    }
}

impl GeoMapper for CorrespondenceTable {
    fn geo_map(
        &self,
        dataset: &KeyedDataset,
        from_geography: &str,
        to_geography: &str,
        mode: RemapMode,
    ) -> GeoResult<KeyedDataset> {
        let idx = dataset
            .dim_index(from_geography)
            .ok_or_else(|| GeoError::MissingDimension {
                geography: from_geography.to_string(),
            })?;

        if from_geography == to_geography {
            return Ok(dataset.clone());
        }

        let corr =
            self.lookup(from_geography, to_geography)
                .ok_or_else(|| GeoError::NoCorrespondence {
                    from: from_geography.to_string(),
                    to: to_geography.to_string(),
                })?;
        let shares = corr.shares(mode);

        debug!(
            from = from_geography,
            to = to_geography,
            %mode,
            rows = dataset.len(),
            "remapping geography"
        );

        let mut dims = dataset.dims().to_vec();
        dims[idx] = to_geography.to_string();
        let mut out = KeyedDataset::from_layout(dims, dataset.columns().to_vec())?;

        for (key, values) in dataset.iter() {
            let targets = shares.get(&key[idx]).ok_or_else(|| GeoError::Unmapped {
                geography: from_geography.to_string(),
                value: key[idx].to_string(),
                to: to_geography.to_string(),
            })?;
            for (target, share) in targets {
                let mut k = key.to_vec();
                k[idx] = target.clone();
                let scaled: Vec<Real> = values.iter().map(|v| v * share).collect();
                out.accumulate(k, &scaled)?;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_core::key;

    // Two states split unevenly across two zones:
    //   s1 -> z1 (3), z2 (1)
    //   s2 -> z2 (2)
    fn table() -> CorrespondenceTable {
        let mut t = CorrespondenceTable::new();
        t.add(
            "state",
            "zone",
            [
                (Key::text("s1"), Key::text("z1"), 3.0),
                (Key::text("s1"), Key::text("z2"), 1.0),
                (Key::text("s2"), Key::text("z2"), 2.0),
            ],
        )
        .unwrap();
        t
    }

    fn by_state() -> KeyedDataset {
        KeyedDataset::from_values(
            &["state", "year"],
            [(key!["s1", 2020], 8.0), (key!["s2", 2020], 4.0)],
        )
        .unwrap()
    }

    #[test]
    fn total_mode_preserves_sum() {
        let out = table()
            .geo_map(&by_state(), "state", "zone", RemapMode::Total)
            .unwrap();
        assert_eq!(out.dims(), ["zone", "year"]);
        assert_eq!(out.value(&key!["z1", 2020]), Some(6.0));
        assert_eq!(out.value(&key!["z2", 2020]), Some(2.0 + 4.0));
        let total: Real = out.iter().map(|(_, v)| v[0]).sum();
        assert_eq!(total, 12.0);
    }

    #[test]
    fn intensity_mode_averages_rates() {
        let out = table()
            .geo_map(&by_state(), "state", "zone", RemapMode::Intensity)
            .unwrap();
        assert_eq!(out.value(&key!["z1", 2020]), Some(8.0));
        // z2 = (8 * 1 + 4 * 2) / 3
        let z2 = out.value(&key!["z2", 2020]).unwrap();
        assert!((z2 - 16.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reverse_direction_uses_transposed_weights() {
        let by_zone =
            KeyedDataset::from_values(&["zone"], [(key!["z1"], 3.0), (key!["z2"], 3.0)]).unwrap();
        let out = table()
            .geo_map(&by_zone, "zone", "state", RemapMode::Total)
            .unwrap();
        assert_eq!(out.value(&key!["s1"]), Some(3.0 + 1.0));
        assert_eq!(out.value(&key!["s2"]), Some(2.0));
    }

    #[test]
    fn same_geography_is_identity() {
        let ds = by_state();
        let out = table()
            .geo_map(&ds, "state", "state", RemapMode::Total)
            .unwrap();
        assert_eq!(out, ds);
    }

    #[test]
    fn unknown_pair_is_an_error() {
        let err = table()
            .geo_map(&by_state(), "state", "county", RemapMode::Total)
            .unwrap_err();
        assert!(matches!(err, GeoError::NoCorrespondence { .. }));
    }

    #[test]
    fn missing_dimension_is_an_error() {
        let err = table()
            .geo_map(&by_state(), "zone", "state", RemapMode::Total)
            .unwrap_err();
        assert!(matches!(err, GeoError::MissingDimension { .. }));
    }

    #[test]
    fn negative_weight_rejected() {
        let mut t = CorrespondenceTable::new();
        let err = t
            .add("a", "b", [(Key::text("x"), Key::text("y"), -1.0)])
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidWeight { .. }));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn total_remap_conserves_totals(
            v1 in 0.0_f64..1e6,
            v2 in 0.0_f64..1e6,
            w in prop::collection::vec(0.01_f64..10.0, 3),
        ) {
            let mut t = CorrespondenceTable::new();
            t.add("state", "zone", [
                (Key::text("s1"), Key::text("z1"), w[0]),
                (Key::text("s1"), Key::text("z2"), w[1]),
                (Key::text("s2"), Key::text("z2"), w[2]),
            ]).unwrap();
            let ds = KeyedDataset::from_values(
                &["state"],
                [(vec![Key::text("s1")], v1), (vec![Key::text("s2")], v2)],
            ).unwrap();
            let out = t.geo_map(&ds, "state", "zone", RemapMode::Total).unwrap();
            let total: Real = out.iter().map(|(_, v)| v[0]).sum();
            prop_assert!((total - (v1 + v2)).abs() <= 1e-9 * (v1 + v2).max(1.0));
        }
    }
}
