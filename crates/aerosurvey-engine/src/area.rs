//! Area decomposition: turn a drawn boundary into a sweep lattice.
//!
//! The boundary's bounding rectangle is reduced to its two vertical
//! edges (west and east). Each edge is recursively halved while both
//! halves stay at least `min_spacing_m` long, and the two edges are then
//! interleaved point-by-point into a coverage path that can be flown
//! as-is.

use geo::{BoundingRect, MultiPoint};
use serde::{Deserialize, Serialize};

use crate::config::AreaConfig;
use crate::geo_math;
use crate::types::{Coordinate, EngineError};

/// Hard ceiling on recursion depth, independent of the waypoint limit.
pub const MAX_SUBDIVISION_DEPTH: u32 = 30;

/// How the subdivided west and east edges are interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPattern {
    /// `W0, E0, W1, E1, ...`: every rung is flown west to east.
    #[default]
    ZigZag,

    /// `W0, E0, E1, W1, W2, E2, ...`: alternate rungs are flown in
    /// opposite directions so consecutive rungs share an edge.
    Boustrophedon,
}

/// Corners of an axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    /// North-west corner.
    pub upper_left: Coordinate,
    /// North-east corner.
    pub upper_right: Coordinate,
    /// South-west corner.
    pub lower_left: Coordinate,
    /// South-east corner.
    pub lower_right: Coordinate,
}

/// Bounding rectangle corners of `points`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `points` is empty.
pub fn bounding_corners(points: &[Coordinate]) -> Result<Corners, EngineError> {
    let multi: MultiPoint<f64> = points.iter().copied().map(geo::Point::from).collect();
    let rect = multi
        .bounding_rect()
        .ok_or_else(|| EngineError::InvalidInput("area boundary has no points".to_string()))?;
    let (min, max) = (rect.min(), rect.max());
    Ok(Corners {
        upper_left: Coordinate::new_unchecked(max.y, min.x),
        upper_right: Coordinate::new_unchecked(max.y, max.x),
        lower_left: Coordinate::new_unchecked(min.y, min.x),
        lower_right: Coordinate::new_unchecked(min.y, max.x),
    })
}

/// Deepest subdivision whose interleaved lattice stays within `limit`.
///
/// An edge subdivided `d` times holds at most `2^d + 1` points, so the
/// lattice holds at most `2 * (2^d + 1)`. Depth 0 (the four corners) is
/// always allowed.
#[must_use]
pub fn depth_for_limit(limit: usize) -> u32 {
    let mut depth = 0;
    while depth < MAX_SUBDIVISION_DEPTH {
        let next_edge = (1usize << (depth + 1)) + 1;
        if next_edge.saturating_mul(2) > limit {
            break;
        }
        depth += 1;
    }
    depth
}

/// Subdivide the segment `a -> b`, returning `a`, any inserted points,
/// and `b` in order.
#[must_use]
pub fn subdivide_edge(
    a: Coordinate,
    b: Coordinate,
    min_spacing_m: u32,
    max_depth: u32,
) -> Vec<Coordinate> {
    let mut points = vec![a];
    subdivide_into(a, b, min_spacing_m, max_depth, &mut points);
    points
}

/// Push every point after `a` up to and including `b`.
fn subdivide_into(
    a: Coordinate,
    b: Coordinate,
    min_spacing_m: u32,
    depth_left: u32,
    out: &mut Vec<Coordinate>,
) {
    if depth_left > 0 {
        let mid = geo_math::midpoint(a, b);
        if geo_math::distance(a, mid) >= min_spacing_m
            && geo_math::distance(mid, b) >= min_spacing_m
        {
            subdivide_into(a, mid, min_spacing_m, depth_left - 1, out);
            subdivide_into(mid, b, min_spacing_m, depth_left - 1, out);
            return;
        }
    }
    out.push(b);
}

/// Interleave two equally long edges according to `pattern`.
#[must_use]
pub fn interleave(
    west: &[Coordinate],
    east: &[Coordinate],
    pattern: SweepPattern,
) -> Vec<Coordinate> {
    let mut lattice = Vec::with_capacity(west.len() + east.len());
    for (rung, (w, e)) in west.iter().zip(east).enumerate() {
        let reversed = pattern == SweepPattern::Boustrophedon && rung % 2 == 1;
        if reversed {
            lattice.push(*e);
            lattice.push(*w);
        } else {
            lattice.push(*w);
            lattice.push(*e);
        }
    }
    lattice
}

/// A sweep lattice and the edge subdivision it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    /// Waypoints in flight order.
    pub points: Vec<Coordinate>,
    /// Points on each subdivided edge.
    pub edge_points: usize,
}

/// Decompose a drawn area into an ordered lattice of waypoints.
///
/// `waypoint_limit` bounds the subdivision depth so the lattice never
/// holds more than `waypoint_limit` points, except that the four
/// rectangle corners are always produced.
///
/// Degenerate rectangles collapse: a single point yields a one-point
/// lattice, a zero-width rectangle yields the single subdivided edge, and
/// a zero-height rectangle yields its two end points.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `points` is empty.
pub fn process_area(
    points: &[Coordinate],
    config: &AreaConfig,
    waypoint_limit: usize,
) -> Result<Vec<Coordinate>, EngineError> {
    decompose(points, config, waypoint_limit).map(|lattice| lattice.points)
}

/// Like [`process_area`], also reporting the edge subdivision.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `points` is empty.
#[allow(clippy::float_cmp)]
pub fn decompose(
    points: &[Coordinate],
    config: &AreaConfig,
    waypoint_limit: usize,
) -> Result<Lattice, EngineError> {
    let corners = bounding_corners(points)?;

    let zero_height = corners.lower_left.latitude == corners.upper_left.latitude;
    let zero_width = corners.lower_left.longitude == corners.lower_right.longitude;

    if zero_height && zero_width {
        tracing::debug!("area collapses to a single point");
        return Ok(Lattice {
            points: vec![corners.lower_left],
            edge_points: 1,
        });
    }
    if zero_height {
        tracing::debug!("area has no latitude span, returning its end points");
        return Ok(Lattice {
            points: vec![corners.lower_left, corners.lower_right],
            edge_points: 1,
        });
    }

    let max_depth = depth_for_limit(waypoint_limit);
    let min_spacing = config.min_spacing_m;

    let mut west = subdivide_edge(corners.lower_left, corners.upper_left, min_spacing, max_depth);
    if zero_width {
        tracing::debug!(points = west.len(), "area has no longitude span, using one edge");
        let edge_points = west.len();
        return Ok(Lattice {
            points: west,
            edge_points,
        });
    }
    let mut east = subdivide_edge(corners.lower_right, corners.upper_right, min_spacing, max_depth);

    if west.len() != east.len() {
        let shorter = west.len().min(east.len());
        tracing::warn!(
            west = west.len(),
            east = east.len(),
            kept = shorter,
            "edge subdivisions diverged, truncating the longer edge"
        );
        west.truncate(shorter);
        east.truncate(shorter);
    }

    let lattice = interleave(&west, &east, config.sweep);
    tracing::info!(
        boundary_points = points.len(),
        edge_points = west.len(),
        lattice_points = lattice.len(),
        min_spacing_m = min_spacing,
        max_depth,
        sweep = ?config.sweep,
        "area decomposed"
    );
    Ok(Lattice {
        points: lattice,
        edge_points: west.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new_unchecked(lat, lng)
    }

    fn config(min_spacing_m: u32, sweep: SweepPattern) -> AreaConfig {
        AreaConfig {
            min_spacing_m,
            sweep,
        }
    }

    #[test]
    fn default_sweep_is_zigzag() {
        assert_eq!(SweepPattern::default(), SweepPattern::ZigZag);
    }

    #[test]
    fn corners_from_polygon() {
        let corners = bounding_corners(&[
            c(25.0, -100.0),
            c(25.01, -99.995),
            c(25.004, -99.99),
            c(25.002, -100.0),
        ])
        .unwrap();
        assert_eq!(corners.upper_left, c(25.01, -100.0));
        assert_eq!(corners.upper_right, c(25.01, -99.99));
        assert_eq!(corners.lower_left, c(25.0, -100.0));
        assert_eq!(corners.lower_right, c(25.0, -99.99));
    }

    #[test]
    fn empty_boundary_is_invalid() {
        assert!(matches!(
            process_area(&[], &AreaConfig::default(), 100),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn single_point_collapses() {
        let p = c(25.0, -100.0);
        let lattice = process_area(&[p], &AreaConfig::default(), 100).unwrap();
        assert_eq!(lattice, vec![p]);
    }

    #[test]
    fn repeated_point_collapses() {
        let p = c(25.0, -100.0);
        let lattice = process_area(&[p, p, p], &AreaConfig::default(), 100).unwrap();
        assert_eq!(lattice, vec![p]);
    }

    #[test]
    fn rectangle_with_500m_spacing() {
        // 0.01 deg of latitude is ~1112 m: one split into ~556 m halves,
        // which are too short to split again.
        let lattice = process_area(
            &[c(25.0, -100.0), c(25.01, -99.99)],
            &config(500, SweepPattern::ZigZag),
            100,
        )
        .unwrap();
        assert_eq!(lattice.len(), 6);
        let west: Vec<_> = lattice.iter().step_by(2).copied().collect();
        let east: Vec<_> = lattice.iter().skip(1).step_by(2).copied().collect();
        for edge in [&west, &east] {
            for pair in edge.windows(2) {
                assert!(geo_math::distance(pair[0], pair[1]) >= 500);
            }
        }
        assert_eq!(west[0], c(25.0, -100.0));
        assert_eq!(east[2], c(25.01, -99.99));
    }

    #[test]
    fn zigzag_and_boustrophedon_orders() {
        let west = [c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)];
        let east = [c(0.0, 1.0), c(1.0, 1.0), c(2.0, 1.0)];
        assert_eq!(
            interleave(&west, &east, SweepPattern::ZigZag),
            vec![west[0], east[0], west[1], east[1], west[2], east[2]]
        );
        assert_eq!(
            interleave(&west, &east, SweepPattern::Boustrophedon),
            vec![west[0], east[0], east[1], west[1], west[2], east[2]]
        );
    }

    #[test]
    fn subdivision_stops_below_spacing() {
        let a = c(25.0, -100.0);
        let b = c(25.0001, -100.0); // ~11 m
        assert_eq!(subdivide_edge(a, b, 15, 10), vec![a, b]);
    }

    #[test]
    fn subdivision_respects_depth() {
        let a = c(25.0, -100.0);
        let b = c(25.1, -100.0); // ~11 km
        assert_eq!(subdivide_edge(a, b, 1, 0).len(), 2);
        assert_eq!(subdivide_edge(a, b, 1, 3).len(), 9);
    }

    #[test]
    fn depth_for_limit_bounds_lattice() {
        assert_eq!(depth_for_limit(0), 0);
        assert_eq!(depth_for_limit(4), 0);
        assert_eq!(depth_for_limit(6), 1);
        assert_eq!(depth_for_limit(9), 1);
        assert_eq!(depth_for_limit(10), 2);
        assert_eq!(depth_for_limit(100), 5);
        for limit in 4..200 {
            let depth = depth_for_limit(limit);
            assert!(2 * ((1usize << depth) + 1) <= limit);
        }
    }

    #[test]
    fn waypoint_limit_caps_lattice() {
        let lattice = process_area(
            &[c(25.0, -100.0), c(25.1, -99.9)],
            &config(1, SweepPattern::ZigZag),
            20,
        )
        .unwrap();
        assert!(lattice.len() <= 20);
        assert_eq!(lattice.len(), 18); // depth 3: 2 * (8 + 1)
    }

    #[test]
    fn zero_width_area_uses_one_edge() {
        let lattice = process_area(
            &[c(25.0, -100.0), c(25.01, -100.0)],
            &config(500, SweepPattern::ZigZag),
            100,
        )
        .unwrap();
        assert_eq!(lattice.len(), 3);
        assert!(lattice.iter().all(|p| (p.longitude + 100.0).abs() < f64::EPSILON));
    }

    #[test]
    fn zero_height_area_returns_end_points() {
        let lattice = process_area(
            &[c(25.0, -100.0), c(25.0, -99.99)],
            &config(500, SweepPattern::ZigZag),
            100,
        )
        .unwrap();
        assert_eq!(lattice, vec![c(25.0, -100.0), c(25.0, -99.99)]);
    }

    #[test]
    fn sweep_serde_names() {
        let json = serde_json::to_string(&SweepPattern::Boustrophedon).unwrap();
        assert_eq!(json, r#""boustrophedon""#);
    }
}
