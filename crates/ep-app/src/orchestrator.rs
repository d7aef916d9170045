//! Run state machine: demand solve, supply solve, reconciliation, export.

use std::time::Instant;

use ep_core::KeyedDataset;
use ep_geo::RemapMode;
use ep_project::ScenarioDef;
use ep_results::{CheckpointManifest, CheckpointStore, CheckpointTag, OutputCategory, OutputSink, ResultSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::combined;
use crate::context::ModelContext;
use crate::engines::{DemandEngine, SupplyBuilder, SupplyEngine, SupplyLinks, required};
use crate::error::{AppError, AppResult};
use crate::io_export;
use crate::payback;
use crate::phase::Phase;
use crate::progress::{ProgressCallback, RunStage, SupplyProgress, emit_progress};

/// What one invocation of [`PathwaysModel::run`] should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunFlags {
    pub solve_demand: bool,
    pub solve_supply: bool,
    /// The model was restored from a demand checkpoint.
    pub load_demand: bool,
    /// The model was restored from a full checkpoint.
    pub load_supply: bool,
    pub export_results: bool,
    pub save_models: bool,
    pub append_results: bool,
}

impl RunFlags {
    /// Solve both sides and export, keeping no checkpoints.
    pub fn full() -> Self {
        Self {
            solve_demand: true,
            solve_supply: true,
            export_results: true,
            ..Self::default()
        }
    }
}

/// Per-phase wall-clock breakdown of one run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub demand_time_s: f64,
    pub supply_time_s: f64,
    pub combine_time_s: f64,
    pub export_time_s: f64,
    pub checkpoint_time_s: f64,
    pub total_time_s: f64,
    pub load_time_s: f64,
    pub supply_years_calculated: usize,
    pub tables_written: usize,
}

/// Serialized whole-model state.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSnapshot<D, S> {
    pub scenario_id: String,
    pub scenario: ScenarioDef,
    pub api_run: bool,
    pub phase: Phase,
    pub demand: D,
    pub supply: Option<S>,
    pub outputs: ResultSet,
}

#[derive(Serialize)]
struct SnapshotRef<'a, D, S> {
    scenario_id: &'a str,
    scenario: &'a ScenarioDef,
    api_run: bool,
    phase: Phase,
    demand: &'a D,
    supply: Option<&'a S>,
    outputs: &'a ResultSet,
}

/// Top-level model: one scenario, one demand engine, at most one supply engine.
pub struct PathwaysModel<D, B: SupplyBuilder> {
    scenario_id: String,
    scenario: ScenarioDef,
    api_run: bool,
    demand: D,
    supply: Option<B::Engine>,
    builder: B,
    outputs: ResultSet,
    phase: Phase,
}

impl<D, B> PathwaysModel<D, B>
where
    D: DemandEngine + Serialize + DeserializeOwned,
    B: SupplyBuilder,
    B::Engine: Serialize + DeserializeOwned,
{
    pub fn new(scenario: ScenarioDef, demand: D, builder: B, api_run: bool) -> Self {
        Self {
            scenario_id: scenario.id.clone(),
            scenario,
            api_run,
            demand,
            supply: None,
            builder,
            outputs: ResultSet::new(),
            phase: Phase::Unconfigured,
        }
    }

    /// Resume from a checkpoint written by an earlier run.
    pub fn from_snapshot(snapshot: ModelSnapshot<D, B::Engine>, builder: B) -> Self {
        Self {
            scenario_id: snapshot.scenario_id,
            scenario: snapshot.scenario,
            api_run: snapshot.api_run,
            demand: snapshot.demand,
            supply: snapshot.supply,
            builder,
            outputs: snapshot.outputs,
            phase: snapshot.phase,
        }
    }

    /// Load the checkpoint tagged `tag` for `scenario_id`.
    pub fn load_checkpoint(
        store: &CheckpointStore,
        scenario_id: &str,
        tag: CheckpointTag,
        builder: B,
    ) -> AppResult<Self> {
        let (manifest, snapshot): (CheckpointManifest, ModelSnapshot<D, B::Engine>) =
            store.load(scenario_id, tag)?;
        info!(scenario = scenario_id, %tag, phase = %manifest.phase, "loaded checkpoint");
        Ok(Self::from_snapshot(snapshot, builder))
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn scenario(&self) -> &ScenarioDef {
        &self.scenario
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn demand(&self) -> &D {
        &self.demand
    }

    pub fn supply(&self) -> Option<&B::Engine> {
        self.supply.as_ref()
    }

    /// Combined-output tables.
    pub fn outputs(&self) -> &ResultSet {
        &self.outputs
    }

    pub fn save_checkpoint(
        &self,
        store: &CheckpointStore,
        tag: CheckpointTag,
    ) -> AppResult<CheckpointManifest> {
        let snapshot = SnapshotRef {
            scenario_id: &self.scenario_id,
            scenario: &self.scenario,
            api_run: self.api_run,
            phase: self.phase,
            demand: &self.demand,
            supply: self.supply.as_ref(),
            outputs: &self.outputs,
        };
        Ok(store.save(&self.scenario_id, tag, self.phase.as_str(), &snapshot)?)
    }

    pub fn run(&mut self, ctx: &ModelContext, flags: RunFlags) -> AppResult<RunTimingSummary> {
        self.run_with_progress(ctx, flags, None)
    }

    /// Run the phases selected by `flags`.
    ///
    /// On failure the model is checkpointed with the `error` tag (when
    /// `save_models` is set), marked failed, and the error is returned.
    pub fn run_with_progress(
        &mut self,
        ctx: &ModelContext,
        flags: RunFlags,
        mut progress_cb: ProgressCallback<'_>,
    ) -> AppResult<RunTimingSummary> {
        if self.phase == Phase::Failed {
            return Err(AppError::Precondition {
                what: format!(
                    "scenario {} failed earlier; start a new model or resume from a checkpoint",
                    self.scenario_id
                ),
            });
        }

        let started = Instant::now();
        let mut timing = RunTimingSummary::default();
        let result = self.run_phases(ctx, flags, &mut progress_cb, started, &mut timing);

        if let Err(err) = result {
            if flags.save_models {
                match ctx
                    .checkpoint_store()
                    .and_then(|store| self.save_checkpoint(&store, CheckpointTag::Error))
                {
                    Ok(_) => info!(scenario = %self.scenario_id, "saved error checkpoint"),
                    Err(save_err) => {
                        warn!(scenario = %self.scenario_id, error = %save_err, "could not save error checkpoint")
                    }
                }
            }
            self.phase.fail();
            return Err(err);
        }

        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            &self.scenario_id,
            RunStage::Completed,
            started,
            Some("Run completed".to_string()),
            None,
        );
        Ok(timing)
    }

    fn run_phases(
        &mut self,
        ctx: &ModelContext,
        flags: RunFlags,
        progress_cb: &mut ProgressCallback<'_>,
        started: Instant,
        timing: &mut RunTimingSummary,
    ) -> AppResult<()> {
        let sink = ctx.output_sink(&self.scenario.name);

        if flags.solve_demand && !(flags.load_demand || flags.load_supply) {
            emit_progress(
                progress_cb,
                &self.scenario_id,
                RunStage::SolvingDemand,
                started,
                Some("Solving demand".to_string()),
                None,
            );
            let t = Instant::now();
            self.calculate_demand(ctx, flags.save_models, timing)?;
            timing.demand_time_s = t.elapsed().as_secs_f64();
        }

        if !flags.append_results {
            sink.purge()?;
        }

        // Demand restored only to re-run supply: its outputs are written after supply.
        let defer_demand_export = flags.load_demand && flags.solve_supply;
        let export_demand = flags.export_results && !self.api_run;
        if export_demand && !defer_demand_export && self.phase.at_least(Phase::DemandSolved) {
            self.export_category(&sink, OutputCategory::Demand, timing)?;
        }

        let mut supply_ran = false;
        if flags.solve_supply && !flags.load_supply {
            if flags.load_demand {
                self.scenario = ctx.load_scenario(&self.scenario_id)?;
                info!(scenario = %self.scenario_id, "reloaded scenario");
            }
            emit_progress(
                progress_cb,
                &self.scenario_id,
                RunStage::ConfiguringSupply,
                started,
                Some("Configuring energy system supply".to_string()),
                None,
            );
            let t = Instant::now();
            self.calculate_supply(ctx, flags.save_models, progress_cb, started, timing)?;
            timing.supply_time_s = t.elapsed().as_secs_f64();
            supply_ran = true;
        }

        if defer_demand_export && export_demand && self.phase.at_least(Phase::DemandSolved) {
            self.export_category(&sink, OutputCategory::Demand, timing)?;
        }

        let supply_loaded = flags.load_supply && self.phase.at_least(Phase::SupplySolved);
        if flags.load_supply && !supply_loaded {
            warn!(scenario = %self.scenario_id, phase = %self.phase, "no solved supply side to export");
        }
        if flags.export_results && (supply_ran || supply_loaded) {
            let t = Instant::now();
            emit_progress(
                progress_cb,
                &self.scenario_id,
                RunStage::LinkingSupply,
                started,
                Some("Calculating link to supply".to_string()),
                None,
            );
            self.supply_mut()?.calculate_supply_outputs()?;
            self.pass_supply_results_back_to_demand(ctx)?;

            emit_progress(
                progress_cb,
                &self.scenario_id,
                RunStage::CombiningResults,
                started,
                Some("Calculating combined results".to_string()),
                None,
            );
            self.calculate_combined_results(ctx)?;
            if let Some(reconciliation) = &self.demand.results().electricity_reconciliation {
                self.outputs
                    .insert("electricity_reconciliation", reconciliation.clone());
            }
            self.phase.advance(Phase::Combined)?;
            timing.combine_time_s = t.elapsed().as_secs_f64();

            emit_progress(
                progress_cb,
                &self.scenario_id,
                RunStage::ExportingResults,
                started,
                Some("Exporting supply and combined results".to_string()),
                None,
            );
            self.export_category(&sink, OutputCategory::Supply, timing)?;
            self.export_category(&sink, OutputCategory::Combined, timing)?;
            self.export_io(ctx, &sink, timing)?;
        }

        Ok(())
    }

    fn supply_ref(&self) -> AppResult<&B::Engine> {
        self.supply.as_ref().ok_or_else(|| AppError::Precondition {
            what: "supply engine has not been built".to_string(),
        })
    }

    fn supply_mut(&mut self) -> AppResult<&mut B::Engine> {
        self.supply.as_mut().ok_or_else(|| AppError::Precondition {
            what: "supply engine has not been built".to_string(),
        })
    }

    fn calculate_demand(
        &mut self,
        ctx: &ModelContext,
        save_models: bool,
        timing: &mut RunTimingSummary,
    ) -> AppResult<()> {
        info!(scenario = %self.scenario_id, "Solving energy system demand");
        self.demand.solve(ctx)?;
        self.phase.advance(Phase::DemandSolved)?;

        if ctx.config().output_detail.output_payback
            && payback::has_payback_inputs(self.demand.results())
        {
            let d_payback = payback::demand_payback(ctx, &self.demand)?;
            let d_payback_energy = payback::demand_payback_energy(ctx, &self.demand)?;
            let outputs = self.demand.outputs_mut();
            outputs.insert("d_payback", d_payback);
            outputs.insert("d_payback_energy", d_payback_energy);
        }

        if save_models {
            let t = Instant::now();
            self.save_checkpoint(&ctx.checkpoint_store()?, CheckpointTag::Demand)?;
            timing.checkpoint_time_s += t.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn calculate_supply(
        &mut self,
        ctx: &ModelContext,
        save_models: bool,
        progress_cb: &mut ProgressCallback<'_>,
        started: Instant,
        timing: &mut RunTimingSummary,
    ) -> AppResult<()> {
        if !self.phase.at_least(Phase::DemandSolved) {
            return Err(AppError::Precondition {
                what: "demand must be solved before supply".to_string(),
            });
        }
        info!(scenario = %self.scenario_id, "Configuring energy system supply");
        self.supply = Some(self.builder.build(&self.scenario, self.demand.results())?);
        let scenario = self.scenario.clone();
        let scenario_id = self.scenario_id.clone();
        let years = ctx.years().to_vec();
        let supply = self.supply_mut()?;
        supply.add_nodes()?;
        supply.add_measures(&scenario)?;
        supply.initial_calculate()?;

        let total_years = years.len();
        let mut calculated = 0usize;
        let loop_result = supply.calculate_loop(&years, &mut |year| {
            calculated += 1;
            emit_progress(
                progress_cb,
                &scenario_id,
                RunStage::SolvingSupply,
                started,
                Some(format!("Converged {year} ({calculated} of {total_years} supply years)")),
                Some(SupplyProgress {
                    calculated_years: calculated,
                    total_years,
                }),
            );
        });
        timing.supply_years_calculated = calculated;
        loop_result?;

        self.supply_mut()?.final_calculate()?;
        self.phase.advance(Phase::SupplySolved)?;

        if save_models {
            let t = Instant::now();
            let store = ctx.checkpoint_store()?;
            self.save_checkpoint(&store, CheckpointTag::Full)?;
            store.remove(&self.scenario_id, CheckpointTag::Demand)?;
            timing.checkpoint_time_s += t.elapsed().as_secs_f64();
        }
        Ok(())
    }

    fn pass_supply_results_back_to_demand(&mut self, ctx: &ModelContext) -> AppResult<()> {
        let results = self.supply_ref()?.results();
        let to_combined = |table: &Option<KeyedDataset>, name: &str| -> AppResult<KeyedDataset> {
            ctx.geo_map(
                required(table, name)?,
                ctx.supply_geography(),
                ctx.combined_geography(),
                RemapMode::Intensity,
            )
        };
        let links = SupplyLinks {
            emissions: to_combined(&results.emissions_demand_link, "emissions_demand_link")?,
            demand_emissions_rates: to_combined(
                &results.demand_emissions_rates,
                "demand_emissions_rates",
            )?,
            energy: to_combined(&results.energy_demand_link, "energy_demand_link")?,
            cost: to_combined(&results.cost_demand_link, "cost_demand_link")?,
        };

        info!(scenario = %self.scenario_id, "Calculating link to supply");
        self.demand.link_to_supply(&links)?;

        let detail = &ctx.config().output_detail;
        if detail.output_tco {
            if payback::has_tco_inputs(self.demand.results()) {
                self.demand.link_to_supply_tco(&links)?;
            } else {
                warn!("demand side has no tco inputs; skipping tco link");
            }
        }
        if detail.output_payback {
            if payback::has_payback_inputs(self.demand.results()) {
                self.demand.link_to_supply_payback(&links)?;
            } else {
                warn!("demand side has no payback inputs; skipping payback link");
            }
        }
        Ok(())
    }

    fn calculate_combined_results(&mut self, ctx: &ModelContext) -> AppResult<()> {
        let demand = self.demand.results();
        let supply = self.supply_ref()?.results();

        info!("Calculating combined emissions results");
        let c_emissions = combined::combined_emissions(ctx, demand, supply)?;
        info!("Calculating combined cost results");
        let c_costs = combined::combined_costs(ctx, demand, supply)?;
        info!("Calculating combined energy results");
        let c_energy = combined::combined_energy(ctx, demand, supply)?;

        let detail = &ctx.config().output_detail;
        let c_tco = if detail.output_tco && payback::has_tco_inputs(demand) {
            Some(payback::combined_tco(ctx, &self.demand)?)
        } else {
            None
        };
        let c_payback = if detail.output_payback && payback::has_payback_inputs(demand) {
            Some(payback::combined_payback(ctx, &self.demand)?)
        } else {
            None
        };

        self.outputs.insert("c_emissions", c_emissions);
        self.outputs.insert("c_costs", c_costs);
        self.outputs.insert("c_energy", c_energy);
        if let Some(c_tco) = c_tco {
            self.outputs.insert("c_tco", c_tco);
        }
        if let Some(c_payback) = c_payback {
            self.outputs.insert("c_payback", c_payback);
        }
        Ok(())
    }

    fn export_category(
        &self,
        sink: &OutputSink,
        category: OutputCategory,
        timing: &mut RunTimingSummary,
    ) -> AppResult<()> {
        let t = Instant::now();
        let set = match category {
            OutputCategory::Demand => self.demand.outputs(),
            OutputCategory::Supply => self.supply_ref()?.outputs(),
            OutputCategory::Combined => &self.outputs,
            OutputCategory::Dispatch => {
                return Err(AppError::InvalidInput(
                    "dispatch tables are routed from the other categories".to_string(),
                ));
            }
        };
        let written = sink.export_result_set(category, set)?;
        info!(category = category.dir_name(), tables = written.len(), "exported results");
        timing.tables_written += written.len();
        timing.export_time_s += t.elapsed().as_secs_f64();
        Ok(())
    }

    fn export_io(
        &self,
        ctx: &ModelContext,
        sink: &OutputSink,
        timing: &mut RunTimingSummary,
    ) -> AppResult<()> {
        let t = Instant::now();
        let io = io_export::io_table(ctx, self.supply_ref()?.results())?;
        sink.write_table(OutputCategory::Supply, io_export::IO_TABLE_NAME, &io)?;
        timing.tables_written += 1;
        timing.export_time_s += t.elapsed().as_secs_f64();
        Ok(())
    }
}
