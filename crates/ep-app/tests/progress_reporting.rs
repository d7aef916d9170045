//! Integration tests for run progress and timing reporting.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use ep_app::{RunFlags, RunProgressEvent, RunRequest, RunResponse, RunStage, run_scenario_with_progress};

fn demos_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn collect_events(request: &RunRequest<'_>) -> (RunResponse, Vec<RunProgressEvent>) {
    let mut events = Vec::new();
    let response = run_scenario_with_progress(request, Some(&mut |event| events.push(event)))
        .expect("run with progress should succeed");
    (response, events)
}

#[test]
fn stages_and_timing_are_reported() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("ep-progress-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("model.yaml");
    fs::copy(demos_dir().join("model.yaml"), &config_path).unwrap();
    let fixture_path = demos_dir().join("fixture.json");

    let request = RunRequest {
        config_path: &config_path,
        scenario_id: "electrify",
        fixture_path: &fixture_path,
        flags: RunFlags::full(),
        api_run: false,
    };
    let (response, events) = collect_events(&request);

    assert!(events.iter().all(|e| e.scenario_id == "electrify"));
    assert!(matches!(events.first().map(|e| &e.stage), Some(RunStage::LoadingConfig)));
    assert!(matches!(events.last().map(|e| &e.stage), Some(RunStage::Completed)));
    for stage in [
        RunStage::SolvingDemand,
        RunStage::ConfiguringSupply,
        RunStage::SolvingSupply,
        RunStage::LinkingSupply,
        RunStage::CombiningResults,
        RunStage::ExportingResults,
    ] {
        assert!(events.iter().any(|e| e.stage == stage), "expected {stage:?} event");
    }

    let supply: Vec<_> = events.iter().filter_map(|e| e.supply.clone()).collect();
    assert_eq!(
        supply.iter().map(|s| s.calculated_years).collect::<Vec<_>>(),
        [1, 2, 3],
        "one supply event per converged year"
    );
    assert!(supply.iter().all(|s| s.total_years == 3));

    assert_eq!(response.timing.supply_years_calculated, 3);
    assert!(response.timing.tables_written > 0);
    assert!(response.timing.total_time_s >= response.timing.demand_time_s);
    assert!(response.timing.total_time_s > 0.0);
}
