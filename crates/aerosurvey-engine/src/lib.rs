//! aerosurvey-engine: Mission geometry and routing for drone surveys (sans-IO).
//!
//! Turns candidate survey sites or a drawn area into an ordered flight:
//! site selection -> distance matrix -> tour optimization, or
//! area decomposition -> sweep lattice.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! missions and classification results and returns structured data.
//! Persistence and transport live in the calling service.

pub mod area;
pub mod capture;
pub mod config;
pub mod diagnostics;
pub mod geo_math;
mod gls;
pub mod matrix;
pub mod planner;
pub mod selection;
pub mod tour;
pub mod types;

pub use area::SweepPattern;
pub use capture::CaptureName;
pub use config::{AreaConfig, MissionConfig, SelectionConfig, TourConfig};
pub use diagnostics::{Clock, PlanDiagnostics, SystemClock};
pub use matrix::DistanceMatrix;
pub use selection::{Filter, FilterKind, FilterPipeline, PipelineChoice, Selection};
pub use tour::{Tour, TourReport, TourSolver, TourSolverKind};
pub use types::{Category, Coordinate, Distribution, EngineError, Mission, SiteResult};

/// Reorder a mission's waypoints into a short closed tour from its start.
///
/// The result is always a permutation of the input waypoints and never
/// costs more than the input order. Missions with zero or one waypoint,
/// and missions the solver cannot improve within its budget, come back
/// unchanged.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if the mission has waypoints but
/// no start point.
pub fn optimize(mission: Mission, config: &TourConfig) -> Result<Mission, EngineError> {
    tour::optimize(mission, config)
}

/// Decompose a drawn area into a sweep lattice of waypoints.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `points` is empty.
pub fn process_area(
    points: &[Coordinate],
    config: &MissionConfig,
) -> Result<Vec<Coordinate>, EngineError> {
    area::process_area(points, &config.area, config.waypoint_limit)
}

/// Run a selection pipeline over candidate sites.
#[must_use]
pub fn select(results: &[SiteResult], pipeline: &FilterPipeline) -> Vec<SiteResult> {
    selection::select(results, pipeline)
}
