//! Demand entity classification and unit labels.

use std::collections::BTreeMap;

use ep_core::dims::UNIT;
use ep_core::{Key, KeyedDataset};
use serde::{Deserialize, Serialize};

use crate::AccountingResult;

/// What a demand subsector tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    /// Equipment stock with vintages, optionally driven by a service demand.
    Stock {
        stock_unit: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_demand_unit: Option<String>,
    },
    /// Stock that mirrors another subsector's; not a purchase decision of its own.
    Link { stock_unit: String },
    /// Energy projected directly, without a stock rollover.
    EnergyOnly {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_demand_unit: Option<String>,
    },
}

/// Denominator a lifecycle curve is normalized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleBasis {
    /// Units of installed stock (payback curves).
    Stock,
    /// Units of service delivered (TCO).
    ServiceDemand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub id: Key,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl EntityProfile {
    /// Unit label this entity reports under for `basis`, if it supports it.
    pub fn lifecycle_unit(&self, basis: LifecycleBasis) -> Option<&str> {
        match (basis, &self.kind) {
            (LifecycleBasis::Stock, EntityKind::Stock { stock_unit, .. }) => Some(stock_unit),
            (
                LifecycleBasis::ServiceDemand,
                EntityKind::Stock {
                    service_demand_unit: Some(unit),
                    ..
                },
            ) => Some(unit),
            _ => None,
        }
    }
}

/// Unit labels per entity for one lifecycle basis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitRegistry {
    units: BTreeMap<Key, String>,
}

impl UnitRegistry {
    pub fn for_basis(entities: &[EntityProfile], basis: LifecycleBasis) -> Self {
        let units = entities
            .iter()
            .filter_map(|e| {
                e.lifecycle_unit(basis)
                    .map(|u| (e.id.clone(), u.to_uppercase()))
            })
            .collect();
        Self { units }
    }

    pub fn unit_for(&self, entity: &Key) -> Option<&str> {
        self.units.get(entity).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Append a `unit` dimension from each row's entity; unlabeled rows are dropped.
    pub fn label(&self, dataset: &KeyedDataset, entity_dim: &str) -> AccountingResult<KeyedDataset> {
        let idx = dataset.require_dim(entity_dim)?;
        let mut dims = dataset.dims().to_vec();
        dims.push(UNIT.to_string());
        let mut out = KeyedDataset::from_layout(dims, dataset.columns().to_vec())?;
        for (key, values) in dataset.iter() {
            let Some(unit) = self.unit_for(&key[idx]) else {
                continue;
            };
            let mut k = key.to_vec();
            k.push(Key::text(unit));
            out.insert(k, values.to_vec())?;
        }
        Ok(out)
    }
}
