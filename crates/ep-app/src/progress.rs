//! Progress events streamed to frontends while a scenario runs.

use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum RunStage {
    LoadingConfig,
    LoadingCheckpoint,
    SolvingDemand,
    ConfiguringSupply,
    SolvingSupply,
    LinkingSupply,
    CombiningResults,
    ExportingResults,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::LoadingConfig => "Loading configuration",
            RunStage::LoadingCheckpoint => "Loading checkpoint",
            RunStage::SolvingDemand => "Solving demand",
            RunStage::ConfiguringSupply => "Configuring supply",
            RunStage::SolvingSupply => "Solving supply",
            RunStage::LinkingSupply => "Linking supply",
            RunStage::CombiningResults => "Combining results",
            RunStage::ExportingResults => "Exporting results",
            RunStage::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupplyProgress {
    pub calculated_years: usize,
    pub total_years: usize,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub scenario_id: String,
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub supply: Option<SupplyProgress>,
}

pub type ProgressCallback<'a> = Option<&'a mut dyn FnMut(RunProgressEvent)>;

pub(crate) fn emit_progress(
    progress_cb: &mut ProgressCallback<'_>,
    scenario_id: &str,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    supply: Option<SupplyProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            scenario_id: scenario_id.to_string(),
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            supply,
        });
    }
}
