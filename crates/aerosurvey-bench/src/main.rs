//! aerosurvey-bench: CLI tool for mission planning experiments and diagnostics.
//!
//! Reads a mission, a drawn area, or a set of classified captures from a
//! JSON file, runs the matching engine operation with configurable
//! parameters, and prints detailed per-stage diagnostics. Useful for:
//!
//! - Comparing tour solvers (`gls` vs `nearest` vs `exact`)
//! - Tuning selection thresholds and lattice spacing
//! - Measuring per-stage durations to find the slow stage
//! - Producing SVG previews and QGroundControl waypoint files
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin aerosurvey-bench -- optimize mission.json
//! cargo run --release --bin aerosurvey-bench -- area points.json --start 25.0,-100.0
//! cargo run --release --bin aerosurvey-bench -- select results.json --start 25.0,-100.0
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use aerosurvey_engine::{
    Coordinate, Mission, MissionConfig, PlanDiagnostics, SiteResult, SweepPattern, SystemClock,
    TourSolverKind, planner,
};
use aerosurvey_engine::config::{AreaConfig, SelectionConfig, TourConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

/// Survey mission planning and diagnostics.
///
/// Runs a mission planner operation on JSON input with configurable
/// parameters and prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "aerosurvey-bench", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (`-v` info, `-vv` debug). Overrides `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Re-optimize the waypoint order of an existing mission.
    Optimize {
        /// Path to a mission JSON file.
        mission: PathBuf,

        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Decompose a drawn area into a sweep lattice.
    Area {
        /// Path to a JSON array of coordinates.
        points: PathBuf,

        /// Mission start point as `LAT,LNG`.
        #[arg(long, value_parser = parse_coordinate)]
        start: Option<Coordinate>,

        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Select survey sites from classified captures and plan a tour.
    Select {
        /// Path to a JSON array of site results.
        results: PathBuf,

        /// Existing mission to add the sites to.
        #[arg(long, conflicts_with = "start")]
        mission: Option<PathBuf>,

        /// Start point for a new mission as `LAT,LNG`.
        #[arg(long, value_parser = parse_coordinate)]
        start: Option<Coordinate>,

        #[command(flatten)]
        plan: PlanArgs,
    },
}

/// Planner parameters and output options shared by every subcommand.
#[derive(Args)]
struct PlanArgs {
    /// Maximum number of waypoints in a mission.
    #[arg(long, default_value_t = MissionConfig::DEFAULT_WAYPOINT_LIMIT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    waypoint_limit: usize,

    /// Tour solving strategy.
    #[arg(long, value_enum, default_value_t = Solver::Gls)]
    solver: Solver,

    /// Wall-clock budget for the tour search in seconds.
    #[arg(long, default_value_t = TourConfig::DEFAULT_TIME_BUDGET.as_secs_f64())]
    time_budget: f64,

    /// Stop the tour search after this many improvement iterations.
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Guided local search penalty factor.
    #[arg(long, default_value_t = TourConfig::DEFAULT_PENALTY_FACTOR)]
    penalty_factor: f64,

    /// Minimum spacing between lattice points on an area edge, in metres.
    #[arg(long, default_value_t = AreaConfig::DEFAULT_MIN_SPACING_M)]
    area_spacing: u32,

    /// Order in which lattice points are flown.
    #[arg(long, value_enum, default_value_t = Sweep::ZigZag)]
    sweep: Sweep,

    /// Minimum distance between selected sites, in metres.
    #[arg(long, default_value_t = SelectionConfig::DEFAULT_MIN_SPACING_M)]
    site_spacing: u32,

    /// Discard sites with more water than this percentage.
    #[arg(long, default_value_t = SelectionConfig::DEFAULT_MAX_WATER_PCT)]
    max_water: f64,

    /// Discard sites with more exposed soil than this percentage.
    #[arg(long)]
    max_exposed_soil: Option<f64>,

    /// Full mission config as a JSON string.
    ///
    /// When provided, all other planner parameter flags are ignored.
    /// The JSON must be a valid `MissionConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output the mission and diagnostics as JSON instead of the report.
    #[arg(long)]
    json: bool,

    /// Write the planned mission as JSON to a file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write an SVG preview to a file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write a QGroundControl waypoint file.
    #[arg(long)]
    wpl: Option<PathBuf>,

    /// Survey altitude above the start point for `--wpl`, in metres.
    #[arg(long, default_value_t = 40.0)]
    altitude: f64,
}

/// Tour solver selection.
#[derive(Clone, Copy, ValueEnum)]
enum Solver {
    /// Cheapest-arc construction refined by guided local search.
    Gls,
    /// Cheapest-arc construction only.
    Nearest,
    /// Exact dynamic programming for small missions.
    Exact,
}

/// Lattice sweep order selection.
#[derive(Clone, Copy, ValueEnum)]
enum Sweep {
    /// Every rung flown west to east.
    ZigZag,
    /// Alternate rungs flown in opposite directions.
    Boustrophedon,
}

/// Parse `LAT,LNG` into a validated coordinate.
fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    Coordinate::new(lat, lng).map_err(|e| e.to_string())
}

/// Build a [`MissionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(args: &PlanArgs) -> Result<MissionConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let time_budget = Duration::try_from_secs_f64(args.time_budget)
        .map_err(|e| format!("Invalid --time-budget {}: {e}", args.time_budget))?;

    Ok(MissionConfig {
        waypoint_limit: args.waypoint_limit,
        tour: TourConfig {
            solver: match args.solver {
                Solver::Gls => TourSolverKind::GuidedLocalSearch,
                Solver::Nearest => TourSolverKind::NearestNeighbor,
                Solver::Exact => TourSolverKind::Exact,
            },
            time_budget,
            max_iterations: args.max_iterations,
            penalty_factor: args.penalty_factor,
        },
        area: AreaConfig {
            min_spacing_m: args.area_spacing,
            sweep: match args.sweep {
                Sweep::ZigZag => SweepPattern::ZigZag,
                Sweep::Boustrophedon => SweepPattern::Boustrophedon,
            },
        },
        selection: SelectionConfig {
            min_spacing_m: args.site_spacing,
            max_water_pct: args.max_water,
            max_exposed_soil_pct: args.max_exposed_soil,
        },
    })
}

/// Install the stderr log subscriber.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Stem of `path` for naming new missions and SVG titles.
fn stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("bench")
}

/// One planner invocation, repeatable for `--runs`.
enum Operation {
    Optimize(Mission),
    Area {
        mission: Mission,
        points: Vec<Coordinate>,
    },
    Select {
        mission: Mission,
        results: Vec<SiteResult>,
    },
}

impl Operation {
    fn load(command: &Command) -> Result<(Self, &PlanArgs), String> {
        match command {
            Command::Optimize { mission, plan } => Ok((Self::Optimize(read_json(mission)?), plan)),
            Command::Area {
                points,
                start,
                plan,
            } => {
                let mission =
                    planner::initialize(stem(points), *start).map_err(|e| e.to_string())?;
                Ok((
                    Self::Area {
                        mission,
                        points: read_json(points)?,
                    },
                    plan,
                ))
            }
            Command::Select {
                results,
                mission,
                start,
                plan,
            } => {
                let mission = match mission {
                    Some(path) => read_json(path)?,
                    None => planner::initialize(stem(results), *start).map_err(|e| e.to_string())?,
                };
                Ok((
                    Self::Select {
                        mission,
                        results: read_json(results)?,
                    },
                    plan,
                ))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Optimize(mission) => format!(
                "optimize: mission {:?} with {} waypoints",
                mission.id,
                mission.waypoints.len()
            ),
            Self::Area { points, .. } => format!("area: {} boundary points", points.len()),
            Self::Select { mission, results } => format!(
                "select: {} candidate sites into mission {:?}",
                results.len(),
                mission.id
            ),
        }
    }

    fn run(&self, config: &MissionConfig) -> Result<(Mission, PlanDiagnostics), String> {
        let planned = match self {
            Self::Optimize(mission) => planner::edit(mission.clone(), config, &SystemClock),
            Self::Area { mission, points } => {
                planner::plan_area(mission.clone(), points, config, &SystemClock)
            }
            Self::Select { mission, results } => {
                planner::plan_sites(mission.clone(), results, config, &SystemClock)
            }
        };
        planned.map_err(|e| format!("Planner error: {e}"))
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    mission: &'a Mission,
    diagnostics: &'a PlanDiagnostics,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let (operation, args) = Operation::load(&cli.command)?;
    let config = config_from_cli(args)?;

    eprintln!("Operation: {}", operation.describe());
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (mission, diagnostics) = operation.run(&config)?;

        if args.json {
            let output = RunOutput {
                mission: &mission,
                diagnostics: &diagnostics,
            };
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }

        // Write files on the first run only.
        if run == 0 {
            write_outputs(args, &config, &mission, &diagnostics);
        }

        all_diagnostics.push(diagnostics);

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    Ok(())
}

/// Write the optional mission, SVG, and waypoint files. Failures are
/// reported but do not abort the run.
fn write_outputs(
    args: &PlanArgs,
    config: &MissionConfig,
    mission: &Mission,
    diagnostics: &PlanDiagnostics,
) {
    if let Some(ref path) = args.output {
        match serde_json::to_string_pretty(mission) {
            Ok(json) => write_file(path, "Mission", &json),
            Err(e) => eprintln!("Error serializing mission: {e}"),
        }
    }

    if let Some(ref path) = args.svg {
        let description = diagnostics.report();
        let config_json = serde_json::to_string(config).ok();
        let metadata = aerosurvey_export::SvgMetadata {
            title: Some(mission.id.as_str()),
            description: Some(description.as_str()),
            config_json: config_json.as_deref(),
        };
        match aerosurvey_export::to_svg(mission, &metadata) {
            Ok(svg) => write_file(path, "SVG", &svg),
            Err(e) => eprintln!("Error exporting SVG: {e}"),
        }
    }

    if let Some(ref path) = args.wpl {
        match aerosurvey_export::to_qgc_wpl(mission, args.altitude) {
            Ok(wpl) => write_file(path, "Waypoint file", &wpl),
            Err(e) => eprintln!("Error exporting waypoint file: {e}"),
        }
    }
}

fn write_file(path: &Path, what: &str, contents: &str) {
    match std::fs::write(path, contents) {
        Ok(()) => {
            eprintln!(
                "{what} written to {} ({} bytes)",
                path.display(),
                contents.len(),
            );
        }
        Err(e) => {
            eprintln!("Error writing {what} to {}: {e}", path.display());
        }
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PlanDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let lengths: Vec<u64> = all_diagnostics
        .iter()
        .map(|d| d.summary.tour_length_m)
        .collect();
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    println!("Tour length: min={shortest}m  max={longest}m");

    // Per-stage means. Every run of one operation records the same stages.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in &first.stages {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stages.iter().find(|s| s.name == stage.name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("aerosurvey-bench").chain(args.iter().copied()))
            .unwrap()
    }

    fn plan_args(cli: &Cli) -> &PlanArgs {
        match &cli.command {
            Command::Optimize { plan, .. }
            | Command::Area { plan, .. }
            | Command::Select { plan, .. } => plan,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_engine_config() {
        let cli = parse(&["optimize", "mission.json"]);
        let config = config_from_cli(plan_args(&cli)).unwrap();
        assert_eq!(config, MissionConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "area",
            "points.json",
            "--start",
            "25.0,-100.0",
            "--area-spacing",
            "500",
            "--sweep",
            "boustrophedon",
            "--solver",
            "exact",
        ]);
        let config = config_from_cli(plan_args(&cli)).unwrap();
        assert_eq!(config.area.min_spacing_m, 500);
        assert_eq!(config.area.sweep, SweepPattern::Boustrophedon);
        assert_eq!(config.tour.solver, TourSolverKind::Exact);
        let Command::Area { start, .. } = cli.command else {
            unreachable!()
        };
        assert_eq!(start, Some(Coordinate::new_unchecked(25.0, -100.0)));
    }

    #[test]
    fn config_json_replaces_flags() {
        let cli = parse(&[
            "select",
            "results.json",
            "--site-spacing",
            "99",
            "--config-json",
            r#"{"waypoint_limit": 12}"#,
        ]);
        let config = config_from_cli(plan_args(&cli)).unwrap();
        assert_eq!(config.waypoint_limit, 12);
        assert_eq!(
            config.selection.min_spacing_m,
            SelectionConfig::DEFAULT_MIN_SPACING_M
        );
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["optimize", "m.json", "--config-json", "{"]);
        assert!(config_from_cli(plan_args(&cli)).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn coordinate_parsing() {
        assert_eq!(
            parse_coordinate(" 25.5, -100 ").unwrap(),
            Coordinate::new_unchecked(25.5, -100.0)
        );
        assert!(parse_coordinate("25.5").is_err());
        assert!(parse_coordinate("95,0").is_err());
    }

    #[test]
    fn mission_and_start_conflict() {
        let result = Cli::try_parse_from([
            "aerosurvey-bench",
            "select",
            "r.json",
            "--mission",
            "m.json",
            "--start",
            "1,2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn area_runs_against_the_planner() {
        let operation = Operation::Area {
            mission: planner::initialize("a", Some(Coordinate::new_unchecked(25.0, -100.0)))
                .unwrap(),
            points: vec![
                Coordinate::new_unchecked(25.0, -100.0),
                Coordinate::new_unchecked(25.01, -99.99),
            ],
        };
        let config = MissionConfig {
            area: AreaConfig {
                min_spacing_m: 500,
                ..AreaConfig::default()
            },
            ..MissionConfig::default()
        };
        let (mission, diagnostics) = operation.run(&config).unwrap();
        assert_eq!(mission.waypoints.len(), 6);
        assert_eq!(diagnostics.operation, "plan_area");
    }
}
