use clap::{Args, Parser, Subcommand};
use ep_app::{
    AppResult, RunFlags, RunProgressEvent, RunRequest, RunStage, project_service, run_service,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "ep-cli")]
#[command(about = "Energy pathways CLI - scenario runs and result export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file syntax and structure
    Validate {
        /// Path to the model configuration file
        config_path: PathBuf,
    },
    /// List scenarios in a configuration
    Scenarios {
        /// Path to the model configuration file
        config_path: PathBuf,
    },
    /// Run a scenario
    Run(RunArgs),
    /// List saved checkpoints
    Checkpoints {
        /// Path to the model configuration file
        config_path: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the model configuration file
    config_path: PathBuf,
    /// Scenario ID to run
    scenario_id: String,
    /// Recorded engine tables to replay
    #[arg(long)]
    fixture: PathBuf,
    /// Do not solve the demand side
    #[arg(long)]
    skip_demand: bool,
    /// Do not solve the supply side
    #[arg(long)]
    skip_supply: bool,
    /// Resume from the scenario's demand checkpoint
    #[arg(long, conflicts_with = "load_supply")]
    load_demand: bool,
    /// Resume from the scenario's full checkpoint
    #[arg(long)]
    load_supply: bool,
    /// Do not write result tables
    #[arg(long)]
    no_export: bool,
    /// Save checkpoints after each solved phase
    #[arg(long)]
    save_models: bool,
    /// Append to existing result tables instead of replacing them
    #[arg(long)]
    append: bool,
    /// Skip demand output files
    #[arg(long)]
    api: bool,
}

impl RunArgs {
    fn flags(&self) -> RunFlags {
        RunFlags {
            solve_demand: !self.skip_demand,
            solve_supply: !self.skip_supply,
            load_demand: self.load_demand,
            load_supply: self.load_supply,
            export_results: !self.no_export,
            save_models: self.save_models,
            append_results: self.append,
        }
    }
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Scenarios { config_path } => cmd_scenarios(&config_path),
        Commands::Run(args) => cmd_run(&args),
        Commands::Checkpoints { config_path } => cmd_checkpoints(&config_path),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let config = project_service::load_config(config_path)?;
    project_service::validate_config(&config)?;
    println!("✓ Configuration is valid");
    println!(
        "  {} supply years, {} scenarios, output geography '{}'",
        config.supply_years.len(),
        config.scenarios.len(),
        config.geography.combined_outputs
    );
    Ok(())
}

fn cmd_scenarios(config_path: &Path) -> AppResult<()> {
    let config = project_service::load_config(config_path)?;
    let scenarios = project_service::list_scenarios(&config);

    if scenarios.is_empty() {
        println!("No scenarios found in configuration");
    } else {
        println!("Scenarios in configuration:");
        for scenario in scenarios {
            println!(
                "  {} - {} ({} demand measures, {} supply measures)",
                scenario.id,
                scenario.name,
                scenario.demand_measure_count,
                scenario.supply_measure_count
            );
        }
    }
    Ok(())
}

fn cmd_run(args: &RunArgs) -> AppResult<()> {
    println!("Running scenario: {}", args.scenario_id);

    let request = RunRequest {
        config_path: &args.config_path,
        scenario_id: &args.scenario_id,
        fixture_path: &args.fixture,
        flags: args.flags(),
        api_run: args.api,
    };

    let mut last_emit = Instant::now();
    let mut last_stage = String::new();
    let result = run_service::run_scenario_with_progress(
        &request,
        Some(&mut |event| {
            let stage_key = format!("{:?}", event.stage);
            let emit_now = stage_key != last_stage || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = stage_key;
                last_emit = Instant::now();
            }
        }),
    );
    clear_progress_line();
    let response = result?;

    println!(
        "✓ Scenario {} ({}) reached phase {}",
        response.scenario_id, response.scenario_name, response.phase
    );
    println!("  Outputs: {}", response.output_dir.display());
    for manifest in &response.checkpoints {
        println!("  Checkpoint: {} ({} bytes)", manifest.tag, manifest.size_bytes);
    }
    print_timing_summary(&response.timing);
    Ok(())
}

fn cmd_checkpoints(config_path: &Path) -> AppResult<()> {
    let manifests = project_service::list_checkpoints(config_path)?;

    if manifests.is_empty() {
        println!("No checkpoints found");
    } else {
        println!("Checkpoints:");
        for manifest in manifests {
            println!(
                "  {} [{}] phase={}  saved={}  {} bytes",
                manifest.scenario_id,
                manifest.tag,
                manifest.phase,
                manifest.timestamp,
                manifest.size_bytes
            );
        }
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match event.stage {
        RunStage::SolvingSupply => {
            if let Some(s) = &event.supply {
                let width = 28usize;
                let fraction = if s.total_years == 0 {
                    1.0
                } else {
                    s.calculated_years as f64 / s.total_years as f64
                };
                let filled = ((fraction * width as f64).round() as usize).min(width);
                let bar = format!(
                    "{}{}",
                    "#".repeat(filled),
                    "-".repeat(width.saturating_sub(filled))
                );
                print!(
                    "\r[{}] {}/{} years  phase={}  elapsed={:.1}s",
                    bar,
                    s.calculated_years,
                    s.total_years,
                    event.stage.label(),
                    event.elapsed_wall_s
                );
                let _ = io::stdout().flush();
            }
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
            let _ = io::stdout().flush();
        }
    }
}

fn print_timing_summary(timing: &ep_app::RunTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    let pct = |t: f64| 100.0 * t / total;

    println!("\nTiming summary:");
    if timing.load_time_s > 0.0 {
        println!("  Load:       {:.3}s ({:.1}%)", timing.load_time_s, pct(timing.load_time_s));
    }
    println!("  Demand:     {:.3}s ({:.1}%)", timing.demand_time_s, pct(timing.demand_time_s));
    println!("  Supply:     {:.3}s ({:.1}%)", timing.supply_time_s, pct(timing.supply_time_s));
    println!("  Combine:    {:.3}s ({:.1}%)", timing.combine_time_s, pct(timing.combine_time_s));
    println!("  Export:     {:.3}s ({:.1}%)", timing.export_time_s, pct(timing.export_time_s));
    if timing.checkpoint_time_s > 0.0 {
        println!("  Checkpoint: {:.3}s", timing.checkpoint_time_s);
    }
    println!("  Total:      {:.3}s", timing.total_time_s);
    println!("  Supply years calculated: {}", timing.supply_years_calculated);
    println!("  Tables written: {}", timing.tables_written);
}
