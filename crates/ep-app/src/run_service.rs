//! Scenario execution service: configuration, checkpoints, and the model run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ep_results::{CheckpointManifest, CheckpointTag};
use tracing::info;

use crate::context::{ModelContext, ProjectScenarioLoader};
use crate::error::AppResult;
use crate::orchestrator::{PathwaysModel, RunFlags, RunTimingSummary};
use crate::phase::Phase;
use crate::progress::{ProgressCallback, RunStage, emit_progress};
use crate::project_service;
use crate::recorded::{RecordedDemand, RecordedModel, RecordedSupplyBuilder};

pub type RecordedPathwaysModel = PathwaysModel<RecordedDemand, RecordedSupplyBuilder>;

/// Request to run one scenario.
pub struct RunRequest<'a> {
    pub config_path: &'a Path,
    pub scenario_id: &'a str,
    /// Recorded engine tables replayed by the run.
    pub fixture_path: &'a Path,
    pub flags: RunFlags,
    /// Suppress demand output files; results are read back through the API.
    pub api_run: bool,
}

/// Response from a scenario run.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub scenario_id: String,
    pub scenario_name: String,
    pub phase: Phase,
    pub output_dir: PathBuf,
    /// Checkpoints on disk for this scenario after the run.
    pub checkpoints: Vec<CheckpointManifest>,
    pub timing: RunTimingSummary,
}

pub fn run_scenario(request: &RunRequest) -> AppResult<RunResponse> {
    run_scenario_with_progress(request, None)
}

/// Run a scenario and stream progress events.
///
/// With `load_supply` the model resumes from the scenario's full checkpoint;
/// with `load_demand` from its demand checkpoint. Otherwise a new model is
/// built from the configuration.
pub fn run_scenario_with_progress(
    request: &RunRequest,
    mut progress_cb: ProgressCallback<'_>,
) -> AppResult<RunResponse> {
    let started = Instant::now();

    emit_progress(
        &mut progress_cb,
        request.scenario_id,
        RunStage::LoadingConfig,
        started,
        Some("Loading configuration".to_string()),
        None,
    );
    let config = project_service::load_config(request.config_path)?;
    let working_dir = ep_project::resolve_working_dir(request.config_path, &config);
    let ctx = ModelContext::from_config(config, working_dir.clone())?
        .with_scenario_loader(Box::new(ProjectScenarioLoader::new(request.config_path)));
    let recorded = RecordedModel::load_json(request.fixture_path)?;

    let flags = request.flags;
    let resume_tag = if flags.load_supply {
        Some(CheckpointTag::Full)
    } else if flags.load_demand {
        Some(CheckpointTag::Demand)
    } else {
        None
    };

    let mut model = match resume_tag {
        Some(tag) => {
            emit_progress(
                &mut progress_cb,
                request.scenario_id,
                RunStage::LoadingCheckpoint,
                started,
                Some(format!("Loading {tag} checkpoint")),
                None,
            );
            RecordedPathwaysModel::load_checkpoint(
                &ctx.checkpoint_store()?,
                request.scenario_id,
                tag,
                recorded.supply_builder(),
            )?
        }
        None => {
            let scenario = ctx.load_scenario(request.scenario_id)?;
            PathwaysModel::new(
                scenario,
                recorded.demand_engine(),
                recorded.supply_builder(),
                request.api_run,
            )
        }
    };
    let load_time_s = started.elapsed().as_secs_f64();

    info!(scenario = request.scenario_id, ?flags, "running scenario");
    let mut timing = model.run_with_progress(&ctx, flags, progress_cb)?;
    timing.load_time_s = load_time_s;
    timing.total_time_s = started.elapsed().as_secs_f64();

    let checkpoints = ctx
        .checkpoint_store()?
        .list()?
        .into_iter()
        .filter(|m| m.scenario_id == request.scenario_id)
        .collect();

    Ok(RunResponse {
        scenario_id: model.scenario_id().to_string(),
        scenario_name: model.scenario().name.clone(),
        phase: model.phase(),
        output_dir: working_dir,
        checkpoints,
        timing,
    })
}
