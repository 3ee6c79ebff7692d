//! QGroundControl waypoint file serializer.
//!
//! Converts a mission into `QGC WPL 110` text, the plain waypoint format
//! read by QGroundControl, Mission Planner, and most MAVLink ground
//! stations.
//!
//! After the `QGC WPL 110` header each line holds twelve tab-separated
//! fields:
//!
//! ```text
//! index  current  frame  command  p1  p2  p3  p4  latitude  longitude  altitude  autocontinue
//! ```
//!
//! Line 0 is the home position (the mission start, absolute frame).
//! Every waypoint follows as a `NAV_WAYPOINT` relative to home altitude,
//! and the file ends with `NAV_RETURN_TO_LAUNCH` so the flight closes
//! back at the start, matching the closed tour the engine optimizes.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use std::fmt::Write;

use aerosurvey_engine::Coordinate;
use aerosurvey_engine::types::Mission;

use crate::ExportError;

/// File header line.
pub const HEADER: &str = "QGC WPL 110";

/// `MAV_CMD_NAV_WAYPOINT`.
pub const MAV_CMD_NAV_WAYPOINT: u16 = 16;
/// `MAV_CMD_NAV_RETURN_TO_LAUNCH`.
pub const MAV_CMD_NAV_RETURN_TO_LAUNCH: u16 = 20;

/// `MAV_FRAME_GLOBAL`: altitude above mean sea level.
const FRAME_GLOBAL: u8 = 0;
/// `MAV_FRAME_GLOBAL_RELATIVE_ALT`: altitude above home.
const FRAME_GLOBAL_RELATIVE_ALT: u8 = 3;

/// Write one mission item line.
fn write_item(
    out: &mut String,
    index: usize,
    current: bool,
    frame: u8,
    command: u16,
    position: Option<Coordinate>,
    altitude_m: f64,
) {
    let (lat, lng) = position.map_or((0.0, 0.0), |p| (p.latitude, p.longitude));
    let _ = writeln!(
        out,
        "{index}\t{}\t{frame}\t{command}\t0\t0\t0\t0\t{lat:.8}\t{lng:.8}\t{altitude_m:.6}\t1",
        u8::from(current),
    );
}

/// Serialize a mission into `QGC WPL 110` text.
///
/// `altitude_m` is the survey altitude above the start point, applied to
/// every waypoint. The home line carries altitude 0.
///
/// # Errors
///
/// Returns [`ExportError::MissingStart`] if the mission has no start
/// point and [`ExportError::InvalidAltitude`] if `altitude_m` is not
/// finite.
///
/// # Examples
///
/// ```
/// use aerosurvey_engine::{Coordinate, Mission};
/// use aerosurvey_export::to_qgc_wpl;
///
/// let mission = Mission::new("m", Some(Coordinate::new_unchecked(25.0, -100.0)))
///     .with_waypoints(vec![Coordinate::new_unchecked(25.001, -100.0)]);
/// let wpl = to_qgc_wpl(&mission, 40.0).unwrap();
/// assert!(wpl.starts_with("QGC WPL 110\n"));
/// assert_eq!(wpl.lines().count(), 4);
/// ```
pub fn to_qgc_wpl(mission: &Mission, altitude_m: f64) -> Result<String, ExportError> {
    let start = mission.start.ok_or(ExportError::MissingStart)?;
    if !altitude_m.is_finite() {
        return Err(ExportError::InvalidAltitude(altitude_m));
    }

    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}");

    write_item(
        &mut out,
        0,
        true,
        FRAME_GLOBAL,
        MAV_CMD_NAV_WAYPOINT,
        Some(start),
        0.0,
    );
    for (i, waypoint) in mission.waypoints.iter().enumerate() {
        write_item(
            &mut out,
            i + 1,
            false,
            FRAME_GLOBAL_RELATIVE_ALT,
            MAV_CMD_NAV_WAYPOINT,
            Some(*waypoint),
            altitude_m,
        );
    }
    write_item(
        &mut out,
        mission.waypoints.len() + 1,
        false,
        FRAME_GLOBAL_RELATIVE_ALT,
        MAV_CMD_NAV_RETURN_TO_LAUNCH,
        None,
        0.0,
    );

    Ok(out)
}
