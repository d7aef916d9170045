//! Lifecycle outputs: demand-side payback curves, combined payback and TCO.

use ep_accounting::{CategoryKey, Combiner, LifecycleBasis, LifecycleEngine, UnitRegistry};
use ep_core::KeyedDataset;
use ep_core::dims::SUBSECTOR;
use tracing::debug;

use crate::context::ModelContext;
use crate::engines::{DemandEngine, DemandResults, required};
use crate::error::AppResult;

const COST_TYPE: &str = "cost type";

fn lifecycle(ctx: &ModelContext) -> AppResult<LifecycleEngine> {
    Ok(LifecycleEngine::new(ctx.years(), SUBSECTOR)?)
}

/// Cumulative annual demand-side cost per unit of stock sold (`d_payback`).
pub fn demand_payback<D: DemandEngine + ?Sized>(
    ctx: &ModelContext,
    demand: &D,
) -> AppResult<KeyedDataset> {
    let results = demand.results();
    let units = UnitRegistry::for_basis(demand.entities(), LifecycleBasis::Stock);
    let curve = lifecycle(ctx)?.accumulate(
        required(&results.annual_costs_payback, "annual_costs_payback")?,
        required(&results.sales, "sales")?,
        &units,
        &ctx.config().cost_unit(),
    )?;
    debug!(rows = curve.len(), "demand payback");
    Ok(curve)
}

/// Cumulative energy per unit of stock sold (`d_payback_energy`).
pub fn demand_payback_energy<D: DemandEngine + ?Sized>(
    ctx: &ModelContext,
    demand: &D,
) -> AppResult<KeyedDataset> {
    let results = demand.results();
    let units = UnitRegistry::for_basis(demand.entities(), LifecycleBasis::Stock);
    let curve = lifecycle(ctx)?.accumulate(
        required(&results.energy_payback, "energy_payback")?,
        required(&results.sales, "sales")?,
        &units,
        &ctx.config().energy_unit(),
    )?;
    debug!(rows = curve.len(), "demand payback energy");
    Ok(curve)
}

/// Combined payback (`c_payback`): embodied supply costs and demand-side
/// costs, each accumulated per unit sold.
///
/// Demand-side costs are laid onto the supply-side key set first; keys the
/// demand side lacks become non-finite ratios and drop out.
pub fn combined_payback<D: DemandEngine + ?Sized>(
    ctx: &ModelContext,
    demand: &D,
) -> AppResult<KeyedDataset> {
    let results = demand.results();
    let engine = lifecycle(ctx)?;
    let units = UnitRegistry::for_basis(demand.entities(), LifecycleBasis::Stock);
    let cost_unit = ctx.config().cost_unit();
    let sales = required(&results.sales, "sales")?;

    let supply_side = engine.in_horizon(required(
        &results.embodied_costs_payback,
        "embodied_costs_payback",
    )?)?;
    let demand_side = engine
        .in_horizon(required(&results.annual_costs_payback, "annual_costs_payback")?)?
        .reindex(&supply_side)?;

    let supply_curve = engine.accumulate(&supply_side, sales, &units, &cost_unit)?;
    let demand_curve = engine.accumulate(&demand_side, sales, &units, &cost_unit)?;

    Ok(Combiner::new(COST_TYPE, false).combine(vec![
        (CategoryKey::SupplySide, Some(supply_curve)),
        (CategoryKey::DemandSide, Some(demand_curve)),
    ])?)
}

/// Combined total cost of ownership (`c_tco`): levelized costs per unit of
/// service demand, without accumulation.
pub fn combined_tco<D: DemandEngine + ?Sized>(
    ctx: &ModelContext,
    demand: &D,
) -> AppResult<KeyedDataset> {
    let results = demand.results();
    let engine = lifecycle(ctx)?;
    let units = UnitRegistry::for_basis(demand.entities(), LifecycleBasis::ServiceDemand);
    let cost_unit = ctx.config().cost_unit();
    let service = required(&results.service_demand_tco, "service_demand_tco")?;

    let supply_side = engine.levelize(
        required(&results.embodied_costs_tco, "embodied_costs_tco")?,
        service,
        &units,
        &cost_unit,
    )?;
    let demand_side = engine.levelize(
        required(&results.levelized_costs_tco, "levelized_costs_tco")?,
        service,
        &units,
        &cost_unit,
    )?;

    Ok(Combiner::new(COST_TYPE, true).combine(vec![
        (CategoryKey::SupplySide, Some(supply_side)),
        (CategoryKey::DemandSide, Some(demand_side)),
    ])?)
}

/// Payback inputs are present when the demand side was solved with them.
pub fn has_payback_inputs(results: &DemandResults) -> bool {
    results.energy_payback.is_some()
}

pub fn has_tco_inputs(results: &DemandResults) -> bool {
    results.levelized_costs_tco.is_some()
}
