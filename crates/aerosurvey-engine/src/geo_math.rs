//! Great-circle distance and midpoint helpers.
//!
//! Distances are whole metres, truncated toward zero. Every consumer
//! (distance matrix, solver costs, spacing checks) works in the same
//! integer unit so costs compare exactly.

use crate::types::Coordinate;

/// Mean Earth radius in metres used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Length of one degree of latitude in metres on the model sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance in fractional metres.
///
/// The two arguments are put in a canonical order before evaluating so
/// that `haversine_m(a, b)` and `haversine_m(b, a)` are bit-identical.
#[must_use]
pub fn haversine_m(p1: Coordinate, p2: Coordinate) -> f64 {
    let (a, b) = if (p1.latitude, p1.longitude) <= (p2.latitude, p2.longitude) {
        (p1, p2)
    } else {
        (p2, p1)
    };

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let half_d_phi = (b.latitude - a.latitude).to_radians() / 2.0;
    let half_d_lambda = (b.longitude - a.longitude).to_radians() / 2.0;

    let h = (phi1.cos() * phi2.cos()).mul_add(
        half_d_lambda.sin().powi(2),
        half_d_phi.sin().powi(2),
    );
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Great-circle distance in whole metres (truncated, not rounded).
#[must_use]
pub fn distance(p1: Coordinate, p2: Coordinate) -> u32 {
    // Half the circumference is ~20 015 km, well inside u32.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let metres = haversine_m(p1, p2) as u32;
    metres
}

/// Arithmetic mean of the two coordinates.
///
/// Not the geodesic midpoint; at survey scales (well under a kilometre
/// per segment) the difference is negligible.
#[must_use]
pub fn midpoint(p1: Coordinate, p2: Coordinate) -> Coordinate {
    Coordinate::new_unchecked(
        f64::midpoint(p1.latitude, p2.latitude),
        f64::midpoint(p1.longitude, p2.longitude),
    )
}

/// `true` when two coordinates are less than one metre apart.
#[must_use]
pub fn coincident(p1: Coordinate, p2: Coordinate) -> bool {
    distance(p1, p2) == 0
}

/// Sum of consecutive distances along an open path.
#[must_use]
pub fn path_length(points: &[Coordinate]) -> u64 {
    points
        .windows(2)
        .map(|pair| u64::from(distance(pair[0], pair[1])))
        .sum()
}

/// Length of the closed flight `start -> waypoints... -> start`.
#[must_use]
pub fn closed_tour_length(start: Coordinate, waypoints: &[Coordinate]) -> u64 {
    let Some((first, last)) = waypoints.first().zip(waypoints.last()) else {
        return 0;
    };
    u64::from(distance(start, *first)) + path_length(waypoints) + u64::from(distance(*last, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new_unchecked(lat, lng)
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = c(25.0, -100.0);
        assert_eq!(distance(p, p), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = c(25.0, -100.0);
        let b = c(25.001, -100.0007);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(haversine_m(a, b).to_bits(), haversine_m(b, a).to_bits());
    }

    #[test]
    fn one_thousandth_degree_of_latitude() {
        // 0.001 deg * 111 194.93 m/deg = 111.19 m -> truncated to 111.
        assert_eq!(distance(c(25.0, -100.0), c(25.001, -100.0)), 111);
    }

    #[test]
    fn distance_truncates_instead_of_rounding() {
        // 0.0000089 deg of latitude is ~0.99 m: truncates to 0.
        let a = c(0.0, 0.0);
        let b = c(0.000_008_9, 0.0);
        assert!(haversine_m(a, b) > 0.9);
        assert_eq!(distance(a, b), 0);
        assert!(coincident(a, b));
    }

    #[test]
    fn longitude_distance_shrinks_with_latitude() {
        let equator = distance(c(0.0, 0.0), c(0.0, 0.01));
        let north = distance(c(60.0, 0.0), c(60.0, 0.01));
        assert!(north < equator);
        // cos(60 deg) = 0.5
        assert!((i64::from(equator) / 2 - i64::from(north)).abs() <= 1);
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        let d = distance(c(0.0, 0.0), c(0.0, 180.0));
        let expected = EARTH_RADIUS_M * std::f64::consts::PI;
        assert!((f64::from(d) - expected).abs() < 1.0);
    }

    #[test]
    fn midpoint_is_component_mean() {
        let m = midpoint(c(25.0, -100.0), c(25.01, -99.99));
        assert!((m.latitude - 25.005).abs() < 1e-12);
        assert!((m.longitude + 99.995).abs() < 1e-12);
    }

    #[test]
    fn closed_tour_length_includes_return_leg() {
        let start = c(25.0, -100.0);
        let w = c(25.001, -100.0);
        assert_eq!(closed_tour_length(start, &[w]), 2 * 111);
        assert_eq!(closed_tour_length(start, &[]), 0);
    }

    #[test]
    fn path_length_of_single_point_is_zero() {
        assert_eq!(path_length(&[c(1.0, 1.0)]), 0);
    }
}
