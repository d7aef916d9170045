//! End-to-end scenario runs against the demo configuration and recorded engines.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ep_app::{
    AppError, EngineError, ModelContext, PathwaysModel, Phase, RecordedModel,
    RecordedPathwaysModel, RunFlags, RunRequest, load_config, run_scenario,
};
use ep_results::{CheckpointStore, CheckpointTag};

fn demos_dir() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // go to crates
    dir.pop(); // go to repo root
    dir.join("demos")
}

fn fixture_path() -> PathBuf {
    demos_dir().join("fixture.json")
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Copy of the demo configuration in a scratch folder; outputs land in `<dir>/runs`.
fn scratch_config(prefix: &str) -> PathBuf {
    let dir = unique_temp_dir(prefix);
    let config_path = dir.join("model.yaml");
    fs::copy(demos_dir().join("model.yaml"), &config_path).unwrap();
    config_path
}

fn runs_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().join("runs")
}

fn request<'a>(config_path: &'a Path, fixture: &'a Path, scenario_id: &'a str, flags: RunFlags) -> RunRequest<'a> {
    RunRequest {
        config_path,
        scenario_id,
        fixture_path: fixture,
        flags,
        api_run: false,
    }
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

fn context(config_path: &Path) -> ModelContext {
    let config = load_config(config_path).unwrap();
    let working_dir = ep_project::resolve_working_dir(config_path, &config);
    ModelContext::from_config(config, working_dir).unwrap()
}

#[test]
fn full_run_writes_every_output_category() {
    let config_path = scratch_config("ep-full-run");
    let fixture = fixture_path();

    let response = run_scenario(&request(&config_path, &fixture, "base", RunFlags::full()))
        .expect("full run should succeed");

    assert_eq!(response.phase, Phase::Combined);
    assert_eq!(response.scenario_name, "Reference");
    assert!(response.checkpoints.is_empty());

    let runs = runs_dir(&config_path);
    for table in [
        "demand_outputs/d_energy.csv",
        "demand_outputs/d_levelized_costs.csv",
        "demand_outputs/d_sales.csv",
        "demand_outputs/d_payback.csv",
        "demand_outputs/d_payback_energy.csv",
        "supply_outputs/s_export_costs.csv",
        "supply_outputs/s_export_emissions.csv",
        "supply_outputs/s_io.csv",
        "combined_outputs/c_costs.csv",
        "combined_outputs/c_emissions.csv",
        "combined_outputs/c_energy.csv",
        "combined_outputs/c_tco.csv",
        "combined_outputs/c_payback.csv",
        "dispatch_outputs/electricity_reconciliation.csv",
    ] {
        assert!(runs.join(table).exists(), "missing {table}");
    }
    assert!(!runs.join("supply_outputs/s_export_energy.csv").exists());

    let costs = fs::read_to_string(runs.join("combined_outputs/c_costs.csv")).unwrap();
    let header = costs.lines().next().unwrap();
    assert!(header.starts_with("SCENARIO,TIMESTAMP,COST TYPE,"));
    assert!(header.ends_with(",2015 USD"));
    assert!(costs.lines().skip(1).all(|l| l.starts_with("REFERENCE,")));
    for category in ["EXPORTED", "SUPPLY-SIDE", "DEMAND-SIDE"] {
        assert!(costs.contains(category), "no {category} rows");
    }

    let emissions = fs::read_to_string(runs.join("combined_outputs/c_emissions.csv")).unwrap();
    let header = emissions.lines().next().unwrap();
    assert!(header.contains("STATE-CONSUMED"));
    assert!(header.contains("STATE-EMITTED"));
}

#[test]
fn io_table_covers_snapshot_years_only() {
    let config_path = scratch_config("ep-io");
    let fixture = fixture_path();
    run_scenario(&request(&config_path, &fixture, "base", RunFlags::full())).unwrap();

    let io = fs::read_to_string(runs_dir(&config_path).join("supply_outputs/s_io.csv")).unwrap();
    let mut lines = io.lines();
    assert_eq!(
        lines.next().unwrap(),
        "SCENARIO,TIMESTAMP,YEAR,SECTOR,FINAL_ENERGY,COLUMN_SECTOR,value"
    );
    let rows: Vec<&str> = lines.collect();
    // 2 snapshot years x 2 sectors x 3 fuels x 2 column sectors
    assert_eq!(rows.len(), 24);
    assert!(rows.iter().all(|r| !r.contains(",2021,")));
    assert!(rows.iter().any(|r| r.ends_with(",2022,transport,oil,residential,0")));
}

#[test]
fn resuming_from_demand_checkpoint_rereads_the_scenario() {
    let config_path = scratch_config("ep-resume");
    let fixture = fixture_path();

    let demand_only = RunFlags {
        solve_demand: true,
        export_results: true,
        save_models: true,
        ..RunFlags::default()
    };
    let first = run_scenario(&request(&config_path, &fixture, "electrify", demand_only)).unwrap();
    assert_eq!(first.phase, Phase::DemandSolved);
    assert_eq!(first.checkpoints.len(), 1);
    assert_eq!(first.checkpoints[0].tag, CheckpointTag::Demand);
    assert!(runs_dir(&config_path).join("demand_outputs/d_energy.csv").exists());

    let yaml = fs::read_to_string(&config_path).unwrap();
    let edited = yaml.replace(
        "supply_measures: [wind buildout]",
        "supply_measures: [wind buildout, grid storage]",
    );
    assert_ne!(yaml, edited);
    fs::write(&config_path, edited).unwrap();

    let resume = RunFlags {
        solve_supply: true,
        load_demand: true,
        export_results: true,
        save_models: true,
        ..RunFlags::default()
    };
    let second = run_scenario(&request(&config_path, &fixture, "electrify", resume)).unwrap();
    assert_eq!(second.phase, Phase::Combined);
    let tags: Vec<CheckpointTag> = second.checkpoints.iter().map(|m| m.tag).collect();
    assert_eq!(tags, vec![CheckpointTag::Full]);

    // demand outputs are written again after the supply side
    let runs = runs_dir(&config_path);
    assert!(runs.join("demand_outputs/d_energy.csv").exists());
    assert!(runs.join("combined_outputs/c_costs.csv").exists());

    let recorded = RecordedModel::load_json(&fixture).unwrap();
    let store = CheckpointStore::for_working_dir(&runs).unwrap();
    let model = RecordedPathwaysModel::load_checkpoint(
        &store,
        "electrify",
        CheckpointTag::Full,
        recorded.supply_builder(),
    )
    .unwrap();
    assert_eq!(model.phase(), Phase::SupplySolved);
    assert_eq!(
        model.supply().unwrap().measures(),
        ["wind buildout".to_string(), "grid storage".to_string()]
    );
}

#[test]
fn full_checkpoint_can_be_reexported() {
    let config_path = scratch_config("ep-reexport");
    let fixture = fixture_path();

    let flags = RunFlags {
        save_models: true,
        ..RunFlags::full()
    };
    run_scenario(&request(&config_path, &fixture, "base", flags)).unwrap();
    let costs = runs_dir(&config_path).join("combined_outputs/c_costs.csv");
    let first_lines = line_count(&costs);

    let reload = RunFlags {
        load_supply: true,
        export_results: true,
        ..RunFlags::default()
    };
    let response = run_scenario(&request(&config_path, &fixture, "base", reload)).unwrap();
    assert_eq!(response.phase, Phase::Combined);
    assert_eq!(line_count(&costs), first_lines);
    // demand tables come from the restored demand side
    assert!(runs_dir(&config_path).join("demand_outputs/d_energy.csv").exists());
}

#[test]
fn append_keeps_rows_from_earlier_runs() {
    let config_path = scratch_config("ep-append");
    let fixture = fixture_path();
    let costs = runs_dir(&config_path).join("combined_outputs/c_costs.csv");

    run_scenario(&request(&config_path, &fixture, "base", RunFlags::full())).unwrap();
    let single = line_count(&costs);
    assert!(single > 1);

    run_scenario(&request(&config_path, &fixture, "base", RunFlags::full())).unwrap();
    assert_eq!(line_count(&costs), single);

    let append = RunFlags {
        append_results: true,
        ..RunFlags::full()
    };
    run_scenario(&request(&config_path, &fixture, "electrify", append)).unwrap();
    let content = fs::read_to_string(&costs).unwrap();
    assert_eq!(content.lines().count(), 2 * single - 1);
    assert!(content.lines().any(|l| l.starts_with("HIGH ELECTRIFICATION,")));
}

#[test]
fn api_runs_skip_demand_files() {
    let config_path = scratch_config("ep-api");
    let fixture = fixture_path();
    let mut req = request(&config_path, &fixture, "base", RunFlags::full());
    req.api_run = true;

    let response = run_scenario(&req).unwrap();
    assert_eq!(response.phase, Phase::Combined);
    let runs = runs_dir(&config_path);
    assert!(!runs.join("demand_outputs").exists());
    assert!(runs.join("combined_outputs/c_costs.csv").exists());
}

#[test]
fn supply_before_demand_is_rejected_and_checkpointed() {
    let config_path = scratch_config("ep-order");
    let ctx = context(&config_path);
    let recorded = RecordedModel::load_json(&fixture_path()).unwrap();
    let scenario = ctx.load_scenario("base").unwrap();
    let mut model = PathwaysModel::new(
        scenario,
        recorded.demand_engine(),
        recorded.supply_builder(),
        false,
    );

    let flags = RunFlags {
        solve_supply: true,
        save_models: true,
        ..RunFlags::default()
    };
    let err = model.run(&ctx, flags).unwrap_err();
    assert!(matches!(err, AppError::Precondition { .. }), "{err}");
    assert_eq!(model.phase(), Phase::Failed);

    let store = ctx.checkpoint_store().unwrap();
    let manifest = store.load_manifest("base", CheckpointTag::Error).unwrap();
    assert_eq!(manifest.phase, "unconfigured");

    // a failed model refuses further work
    let err = model.run(&ctx, RunFlags::full()).unwrap_err();
    assert!(matches!(err, AppError::Precondition { .. }));
}

#[test]
fn supply_failure_saves_error_checkpoint() {
    let config_path = scratch_config("ep-diverge");
    let ctx = context(&config_path);
    let mut recorded = RecordedModel::load_json(&fixture_path()).unwrap();
    recorded.supply.fail_in_year = Some(2021);
    let scenario = ctx.load_scenario("base").unwrap();
    let mut model = PathwaysModel::new(
        scenario,
        recorded.demand_engine(),
        recorded.supply_builder(),
        false,
    );

    let flags = RunFlags {
        save_models: true,
        ..RunFlags::full()
    };
    let err = model.run(&ctx, flags).unwrap_err();
    assert!(
        matches!(err, AppError::Engine(EngineError::NotConverged { year: 2021 })),
        "{err}"
    );
    assert_eq!(model.phase(), Phase::Failed);

    let store = ctx.checkpoint_store().unwrap();
    assert!(store.exists("base", CheckpointTag::Demand));
    assert!(!store.exists("base", CheckpointTag::Full));
    let manifest = store.load_manifest("base", CheckpointTag::Error).unwrap();
    assert_eq!(manifest.phase, "demand_solved");
}

#[test]
fn unknown_scenario_is_reported() {
    let config_path = scratch_config("ep-unknown");
    let fixture = fixture_path();
    let err = run_scenario(&request(&config_path, &fixture, "missing", RunFlags::full())).unwrap_err();
    assert!(matches!(err, AppError::ScenarioNotFound(id) if id == "missing"));
}

#[test]
fn resuming_without_checkpoint_fails() {
    let config_path = scratch_config("ep-no-checkpoint");
    let fixture = fixture_path();
    let flags = RunFlags {
        load_supply: true,
        export_results: true,
        ..RunFlags::default()
    };
    let err = run_scenario(&request(&config_path, &fixture, "base", flags)).unwrap_err();
    assert!(matches!(err, AppError::CheckpointNotFound(_)), "{err}");
}
