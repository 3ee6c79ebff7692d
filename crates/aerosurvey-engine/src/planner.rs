//! Mission planner: the operations a mission service calls.
//!
//! Each operation takes the caller's current [`Mission`] by value and
//! returns the updated mission together with [`PlanDiagnostics`]. No
//! mission state is kept between calls.

use crate::area;
use crate::config::MissionConfig;
use crate::diagnostics::{Clock, PlanDiagnostics, PlanSummary, StageMetrics, StageRecorder};
use crate::geo_math;
use crate::matrix::DistanceMatrix;
use crate::selection::{self, Selection};
use crate::tour::{self, StopReason};
use crate::types::{Coordinate, EngineError, Mission, SiteResult};

/// Create an empty mission.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `start` is out of range.
pub fn initialize(
    id: impl Into<String>,
    start: Option<Coordinate>,
) -> Result<Mission, EngineError> {
    if let Some(start) = &start {
        start.validate()?;
    }
    let mission = Mission::new(id, start);
    tracing::debug!(mission = %mission.id, start = ?mission.start, "mission initialized");
    Ok(mission)
}

/// Re-optimize a mission after the caller changed its waypoints.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] for an invalid `config` and
/// [`EngineError::InvalidInput`] when the mission exceeds the waypoint
/// limit, holds an out-of-range coordinate, or has waypoints but no
/// start.
pub fn edit<C: Clock>(
    mission: Mission,
    config: &MissionConfig,
    clock: &C,
) -> Result<(Mission, PlanDiagnostics), EngineError> {
    config.validate()?;
    check_mission(&mission, config)?;

    let mut recorder = StageRecorder::start(clock);
    let mission = optimize_stages(&mut recorder, mission, config, clock)?;
    Ok(finish(recorder, "edit", mission))
}

/// Select survey sites from classified captures, add them to the
/// mission, and optimize the resulting tour.
///
/// Selected results are attached to the mission and their positions are
/// appended to its waypoints. Selection is capped so the mission stays
/// within the waypoint limit.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] for an invalid `config`,
/// [`EngineError::InvalidInput`] when the mission is invalid or already
/// full, and [`EngineError::EmptyCandidateSet`] when no site survives
/// either selection pipeline.
pub fn plan_sites<C: Clock>(
    mut mission: Mission,
    results: &[SiteResult],
    config: &MissionConfig,
    clock: &C,
) -> Result<(Mission, PlanDiagnostics), EngineError> {
    config.validate()?;
    check_mission(&mission, config)?;
    for result in results {
        result.coordinate.validate()?;
    }

    let room = config.waypoint_limit.saturating_sub(mission.waypoints.len());
    if room == 0 {
        return Err(EngineError::InvalidInput(format!(
            "mission already holds the limit of {} waypoints",
            config.waypoint_limit
        )));
    }

    let mut recorder = StageRecorder::start(clock);
    let Selection {
        results: selected,
        pipeline,
    } = recorder.record("Selection", || {
        let selection = selection::select_with_fallback(results, &config.selection, room)?;
        let metrics = StageMetrics::Selection {
            input_count: results.len(),
            selected_count: selection.results.len(),
            pipeline: selection.pipeline,
            min_spacing_m: config.selection.min_spacing_m,
        };
        Ok::<_, EngineError>((selection, metrics))
    })?;
    tracing::debug!(mission = %mission.id, selected = selected.len(), ?pipeline, "adding sites");

    mission
        .waypoints
        .extend(selected.iter().map(|result| result.coordinate));
    mission.results.extend(selected);

    let mission = optimize_stages(&mut recorder, mission, config, clock)?;
    Ok(finish(recorder, "plan_sites", mission))
}

/// Replace the mission's waypoints with a sweep lattice over a drawn
/// area.
///
/// The lattice is already a coverage path, so it is not reordered.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] for an invalid `config` and
/// [`EngineError::InvalidInput`] when `boundary` is empty or holds an
/// out-of-range coordinate.
pub fn plan_area<C: Clock>(
    mut mission: Mission,
    boundary: &[Coordinate],
    config: &MissionConfig,
    clock: &C,
) -> Result<(Mission, PlanDiagnostics), EngineError> {
    config.validate()?;
    for point in boundary {
        point.validate()?;
    }

    let mut recorder = StageRecorder::start(clock);
    let lattice = recorder.record("Area", || {
        let lattice = area::decompose(boundary, &config.area, config.waypoint_limit)?;
        let metrics = StageMetrics::Area {
            boundary_points: boundary.len(),
            edge_points: lattice.edge_points,
            lattice_points: lattice.points.len(),
            min_spacing_m: config.area.min_spacing_m,
            sweep: config.area.sweep,
        };
        Ok::<_, EngineError>((lattice, metrics))
    })?;

    mission.waypoints = lattice.points;
    mission.results.clear();
    Ok(finish(recorder, "plan_area", mission))
}

fn check_mission(mission: &Mission, config: &MissionConfig) -> Result<(), EngineError> {
    mission.check_limit(config.waypoint_limit)?;
    if let Some(start) = &mission.start {
        start.validate()?;
    }
    for waypoint in &mission.waypoints {
        waypoint.validate()?;
    }
    Ok(())
}

/// Build the distance matrix and reorder the waypoints, recording both
/// stages. Missions with at most one waypoint skip the tour stage.
fn optimize_stages<C: Clock>(
    recorder: &mut StageRecorder<'_, C>,
    mission: Mission,
    config: &MissionConfig,
    clock: &C,
) -> Result<Mission, EngineError> {
    let matrix = recorder.record("Matrix", || {
        let matrix = DistanceMatrix::build(mission.start, &mission.waypoints)?;
        let metrics = StageMetrics::Matrix {
            node_count: matrix.len(),
        };
        Ok::<_, EngineError>((matrix, metrics))
    })?;

    if mission.waypoints.len() <= 1 {
        return Ok(mission);
    }

    recorder.record("Tour", || {
        let input_cost = matrix.tour_cost(&(1..matrix.len()).collect::<Vec<_>>());
        let (mission, report) = tour::reorder(mission, &matrix, &config.tour, clock)?;
        let metrics = match report {
            Some(report) => StageMetrics::Tour {
                solver: report.solver,
                initial_cost_m: report.initial_cost,
                final_cost_m: report.tour.cost,
                iterations: report.iterations,
                stop: report.stop,
                degraded: false,
            },
            None => StageMetrics::Tour {
                solver: config.tour.solver,
                initial_cost_m: input_cost,
                final_cost_m: input_cost,
                iterations: 0,
                stop: StopReason::Converged,
                degraded: true,
            },
        };
        Ok::<_, EngineError>((mission, metrics))
    })
}

fn finish<C: Clock>(
    recorder: StageRecorder<'_, C>,
    operation: &str,
    mission: Mission,
) -> (Mission, PlanDiagnostics) {
    let summary = PlanSummary {
        mission_id: mission.id.clone(),
        waypoint_count: mission.waypoints.len(),
        tour_length_m: mission
            .start
            .map_or(0, |start| geo_math::closed_tour_length(start, &mission.waypoints)),
    };
    let diagnostics = recorder.finish(operation, summary);
    tracing::info!(
        operation,
        mission = %mission.id,
        waypoints = diagnostics.summary.waypoint_count,
        tour_length_m = diagnostics.summary.tour_length_m,
        duration_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
        "plan complete"
    );
    (mission, diagnostics)
}
