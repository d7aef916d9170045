//! Combined emissions, cost and energy tables.
//!
//! Each quantity is assembled from up to three mutually exclusive slices:
//! what the supply side exports, what it embodies in delivered energy, and
//! what the demand side produces directly.

use ep_accounting::{CategoryKey, Combiner, Quantity};
use ep_core::dims::{ENERGY_ACCOUNTING, EXPORT_DOMESTIC, FINAL_ENERGY, SUPPLY_DEMAND, SUPPLY_NODE_EXPORT, YEAR};
use ep_core::{Key, KeyedDataset};
use ep_geo::RemapMode;
use tracing::debug;

use crate::context::ModelContext;
use crate::engines::{DemandResults, SupplyResults, required};
use crate::error::AppResult;

/// Append one constant-valued dimension per `(dim, value)` pair.
fn tag(dataset: &KeyedDataset, tags: &[(&str, &str)]) -> AppResult<KeyedDataset> {
    let mut out = dataset.clone();
    for (dim, value) in tags {
        out = out.add_dim(dim, Key::text(*value))?;
    }
    Ok(out)
}

/// Append `to` carrying the same value as `from` on every row.
fn copy_dim(dataset: &KeyedDataset, from: &str, to: &str) -> AppResult<KeyedDataset> {
    let idx = dataset.require_dim(from)?;
    let mut dims = dataset.dims().to_vec();
    dims.push(to.to_string());
    let mut out = KeyedDataset::from_layout(dims, dataset.columns().to_vec())?;
    for (key, values) in dataset.iter() {
        let mut k = key.to_vec();
        k.push(key[idx].clone());
        out.insert(k, values.to_vec())?;
    }
    Ok(out)
}

fn rename_if_present(dataset: KeyedDataset, from: &str, to: &str) -> AppResult<KeyedDataset> {
    if dataset.has_dim(from) {
        Ok(dataset.rename_dim(from, to)?)
    } else {
        Ok(dataset)
    }
}

fn export_to_combined(ctx: &ModelContext, table: &KeyedDataset) -> AppResult<KeyedDataset> {
    let mapped = ctx.geo_map(
        table,
        ctx.supply_geography(),
        ctx.combined_geography(),
        RemapMode::Total,
    )?;
    rename_if_present(mapped, FINAL_ENERGY, SUPPLY_NODE_EXPORT)
}

fn export_costs(ctx: &ModelContext, supply: &SupplyResults) -> AppResult<Option<KeyedDataset>> {
    let Some(costs) = &supply.export_costs else {
        return Ok(None);
    };
    let costs = export_to_combined(ctx, costs)?;
    Ok(Some(tag(
        &costs,
        &[(EXPORT_DOMESTIC, "EXPORT"), (SUPPLY_DEMAND, "SUPPLY")],
    )?))
}

fn embodied_costs(demand: &DemandResults) -> AppResult<KeyedDataset> {
    let costs = required(&demand.embodied_costs, "embodied_costs")?;
    tag(costs, &[(EXPORT_DOMESTIC, "DOMESTIC"), (SUPPLY_DEMAND, "SUPPLY")])
}

fn direct_demand_costs(
    ctx: &ModelContext,
    demand: &DemandResults,
) -> AppResult<Option<KeyedDataset>> {
    let Some(costs) = &demand.levelized_costs else {
        return Ok(None);
    };
    let mapped = ctx.geo_map(
        costs,
        ctx.demand_geography(),
        ctx.combined_geography(),
        RemapMode::Total,
    )?;
    // Geography and year always survive so the slice lines up with the others.
    let levels: Vec<&str> = mapped
        .dims()
        .iter()
        .map(|d| d.as_str())
        .filter(|d| {
            *d == ctx.combined_geography() || *d == YEAR || ctx.config().combined_level(d)
        })
        .collect();
    let grouped = mapped.group_sum(&levels)?;
    Ok(Some(tag(
        &grouped,
        &[(EXPORT_DOMESTIC, "DOMESTIC"), (SUPPLY_DEMAND, "DEMAND")],
    )?))
}

pub fn combined_costs(
    ctx: &ModelContext,
    demand: &DemandResults,
    supply: &SupplyResults,
) -> AppResult<KeyedDataset> {
    let combined = Combiner::for_quantity(Quantity::Cost).combine(vec![
        (CategoryKey::Exported, export_costs(ctx, supply)?),
        (CategoryKey::SupplySide, Some(embodied_costs(demand)?)),
        (CategoryKey::DemandSide, direct_demand_costs(ctx, demand)?),
    ])?;
    debug!(rows = combined.len(), "combined costs");
    Ok(combined.with_columns(vec![ctx.config().cost_unit()])?)
}

fn export_emissions(
    ctx: &ModelContext,
    supply: &SupplyResults,
) -> AppResult<Option<KeyedDataset>> {
    let Some(emissions) = &supply.export_emissions else {
        return Ok(None);
    };
    let mut mapped = export_to_combined(ctx, emissions)?;
    let emitted_dim = format!("{}_supply", ctx.supply_geography());
    if !ctx.config().combined_level("supply_geography") && mapped.has_dim(&emitted_dim) {
        mapped = mapped.drop_dim(&emitted_dim)?;
    }
    Ok(Some(tag(
        &mapped,
        &[(EXPORT_DOMESTIC, "EXPORT"), (SUPPLY_DEMAND, "SUPPLY")],
    )?))
}

fn embodied_emissions(demand: &DemandResults) -> AppResult<KeyedDataset> {
    let emissions = required(&demand.embodied_emissions, "embodied_emissions")?;
    tag(emissions, &[(EXPORT_DOMESTIC, "DOMESTIC"), (SUPPLY_DEMAND, "SUPPLY")])
}

fn direct_demand_emissions(ctx: &ModelContext, demand: &DemandResults) -> AppResult<KeyedDataset> {
    let emissions = required(&demand.direct_emissions, "direct_emissions")?;
    let mut tagged = tag(
        emissions,
        &[(EXPORT_DOMESTIC, "DOMESTIC"), (SUPPLY_DEMAND, "DEMAND")],
    )?;
    let geo = ctx.combined_geography();
    let emitted_dim = format!("{geo}_supply");
    if ctx.config().combined_level(&emitted_dim) && !tagged.has_dim(&emitted_dim) {
        tagged = copy_dim(&tagged, geo, &emitted_dim)?;
    }
    Ok(tagged)
}

pub fn combined_emissions(
    ctx: &ModelContext,
    demand: &DemandResults,
    supply: &SupplyResults,
) -> AppResult<KeyedDataset> {
    let combined = Combiner::for_quantity(Quantity::Emissions).combine(vec![
        (CategoryKey::Exported, export_emissions(ctx, supply)?),
        (CategoryKey::SupplySide, Some(embodied_emissions(demand)?)),
        (CategoryKey::DemandSide, Some(direct_demand_emissions(ctx, demand)?)),
    ])?;

    let geo = ctx.combined_geography();
    let combined = rename_if_present(combined, &format!("{geo}_supply"), &format!("{geo}-emitted"))?;
    let combined = rename_if_present(combined, geo, &format!("{geo}-consumed"))?;
    debug!(rows = combined.len(), "combined emissions");
    Ok(combined.with_columns(vec![ctx.config().mass_unit()])?)
}

fn export_energy(ctx: &ModelContext, supply: &SupplyResults) -> AppResult<Option<KeyedDataset>> {
    let Some(energy) = &supply.export_energy else {
        return Ok(None);
    };
    let energy = export_to_combined(ctx, energy)?;
    Ok(Some(tag(
        &energy,
        &[(EXPORT_DOMESTIC, "EXPORT"), (ENERGY_ACCOUNTING, "EMBODIED")],
    )?))
}

fn embodied_energy(demand: &DemandResults) -> AppResult<KeyedDataset> {
    let energy = required(&demand.embodied_energy, "embodied_energy")?.drop_zero_rows();
    tag(
        &energy,
        &[(EXPORT_DOMESTIC, "DOMESTIC"), (ENERGY_ACCOUNTING, "EMBODIED")],
    )
}

fn direct_demand_energy(ctx: &ModelContext, demand: &DemandResults) -> AppResult<KeyedDataset> {
    let energy = required(&demand.energy, "energy")?;
    let mapped = ctx.geo_map(
        energy,
        ctx.demand_geography(),
        ctx.combined_geography(),
        RemapMode::Total,
    )?;
    let current = mapped.filter_at_least(YEAR, ctx.config().case.current_year)?;
    tag(
        &current,
        &[(EXPORT_DOMESTIC, "DOMESTIC"), (ENERGY_ACCOUNTING, "FINAL")],
    )
}

pub fn combined_energy(
    ctx: &ModelContext,
    demand: &DemandResults,
    supply: &SupplyResults,
) -> AppResult<KeyedDataset> {
    let combined = Combiner::for_quantity(Quantity::Energy).combine(vec![
        (CategoryKey::Exported, export_energy(ctx, supply)?),
        (CategoryKey::SupplySide, Some(embodied_energy(demand)?)),
        (CategoryKey::DemandSide, Some(direct_demand_energy(ctx, demand)?)),
    ])?;
    debug!(rows = combined.len(), "combined energy");
    Ok(combined.with_columns(vec![ctx.config().energy_unit()])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ds, test_context};

    fn demand() -> DemandResults {
        DemandResults {
            embodied_costs: Some(ds(&["state", "year"], &[(&["north"], 2020, 5.0)])),
            levelized_costs: Some(ds(
                &["state", "subsector", "year"],
                &[(&["north", "heating"], 2020, 3.0), (&["north", "lighting"], 2020, -1.0)],
            )),
            embodied_emissions: Some(ds(
                &["state", "state_supply", "year"],
                &[(&["north", "south"], 2020, 2.0)],
            )),
            direct_emissions: Some(ds(&["state", "year"], &[(&["south"], 2020, 4.0)])),
            embodied_energy: Some(ds(
                &["state", "final_energy", "year"],
                &[(&["north", "gas"], 2020, 7.0), (&["north", "oil"], 2020, 0.0)],
            )),
            energy: Some(ds(
                &["state", "final_energy", "year"],
                &[(&["north", "gas"], 2019, 1.0), (&["north", "gas"], 2020, 6.0)],
            )),
            ..Default::default()
        }
    }

    #[test]
    fn costs_without_exports_have_two_categories() {
        let ctx = test_context(&["state", "year"]);
        let costs = combined_costs(&ctx, &demand(), &SupplyResults::default()).unwrap();

        assert_eq!(
            costs.dims(),
            ["cost type", "state", "year", "export/domestic", "supply/demand"]
        );
        assert_eq!(costs.columns(), ["2015 USD"]);
        assert_eq!(
            costs.value(&ep_core::key!["SUPPLY-SIDE", "north", 2020, "DOMESTIC", "SUPPLY"]),
            Some(5.0)
        );
        // -1 on lighting is summed into the 2020 north total before clamping.
        assert_eq!(
            costs.value(&ep_core::key!["DEMAND-SIDE", "north", 2020, "DOMESTIC", "DEMAND"]),
            Some(2.0)
        );
        assert_eq!(costs.len(), 2);
    }

    #[test]
    fn demand_costs_keep_geography_and_year_without_configured_levels() {
        let ctx = test_context(&[]);
        let demand = DemandResults {
            levelized_costs: Some(ds(
                &["state", "subsector", "year"],
                &[(&["north", "heating"], 2020, 3.0), (&["south", "lighting"], 2021, 4.0)],
            )),
            ..demand()
        };
        let costs = combined_costs(&ctx, &demand, &SupplyResults::default()).unwrap();

        assert_eq!(
            costs.dims(),
            ["cost type", "state", "year", "export/domestic", "supply/demand"]
        );
        assert_eq!(
            costs.value(&ep_core::key!["DEMAND-SIDE", "north", 2020, "DOMESTIC", "DEMAND"]),
            Some(3.0)
        );
        assert_eq!(
            costs.value(&ep_core::key!["DEMAND-SIDE", "south", 2021, "DOMESTIC", "DEMAND"]),
            Some(4.0)
        );
        assert!(costs.iter().all(|(k, _)| k[1] != Key::text("N/A")));
    }

    #[test]
    fn exported_costs_are_remapped_and_renamed() {
        let ctx = test_context(&["state", "year"]);
        let supply = SupplyResults {
            export_costs: Some(ds(
                &["zone", "final_energy", "year"],
                &[(&["grid", "electricity"], 2020, 8.0)],
            )),
            ..Default::default()
        };
        let costs = combined_costs(&ctx, &demand(), &supply).unwrap();
        assert!(costs.has_dim("supply_node_export"));
        // grid splits 3:1 between north and south
        let exported: Vec<f64> = costs
            .iter()
            .filter(|(k, _)| k[0] == Key::text("EXPORTED"))
            .map(|(_, v)| v[0])
            .collect();
        assert_eq!(exported.iter().sum::<f64>(), 8.0);
        assert_eq!(exported.len(), 2);
    }

    #[test]
    fn emissions_split_emitted_and_consumed_geographies() {
        let ctx = test_context(&["state", "year", "state_supply"]);
        let emissions = combined_emissions(&ctx, &demand(), &SupplyResults::default()).unwrap();
        assert_eq!(
            emissions.dims(),
            [
                "emissions type",
                "state-consumed",
                "state-emitted",
                "year",
                "export/domestic",
                "supply/demand"
            ]
        );
        assert_eq!(emissions.columns(), ["TONNE"]);
        // direct emissions are emitted where they are consumed
        assert_eq!(
            emissions.value(&ep_core::key!["DEMAND-SIDE", "south", "south", 2020, "DOMESTIC", "DEMAND"]),
            Some(4.0)
        );
        assert_eq!(
            emissions.value(&ep_core::key!["SUPPLY-SIDE", "north", "south", 2020, "DOMESTIC", "SUPPLY"]),
            Some(2.0)
        );
    }

    #[test]
    fn energy_drops_history_and_zero_rows() {
        let ctx = test_context(&["state", "year"]);
        let energy = combined_energy(&ctx, &demand(), &SupplyResults::default()).unwrap();
        assert_eq!(energy.columns(), ["MMBTU"]);
        assert_eq!(energy.len(), 2);
        assert!(energy.iter().all(|(k, v)| k.contains(&Key::Int(2020)) && v[0] != 0.0));
        let year = energy.require_dim(YEAR).unwrap();
        assert!(energy.iter().all(|(k, _)| k[year] == Key::Int(2020)));
    }
}
