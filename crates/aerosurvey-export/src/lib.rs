//! aerosurvey-export: Pure format serializers (sans-IO)
//!
//! Converts planned missions into output formats: an SVG preview of the
//! flight and a QGroundControl waypoint file for upload to the vehicle.

pub mod svg;
pub mod wpl;

pub use svg::{SvgMetadata, to_svg};
pub use wpl::to_qgc_wpl;

/// Errors produced by the serializers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    /// The mission has neither a start point nor waypoints.
    #[error("mission has nothing to export")]
    EmptyMission,

    /// The format needs a home position but the mission has no start.
    #[error("mission has no start point")]
    MissingStart,

    /// The requested flight altitude is not a finite number of metres.
    #[error("invalid altitude: {0}")]
    InvalidAltitude(f64),
}
