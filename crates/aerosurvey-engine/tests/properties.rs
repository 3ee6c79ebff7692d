//! Property-based tests for the mission engine.
//!
//! These tests check invariants that must hold for every input: distance
//! symmetry, tours that only reorder, lattice spacing, and selection
//! thresholds.

#![allow(clippy::unwrap_used)]

use aerosurvey_engine::selection::select_with_fallback;
use aerosurvey_engine::*;
use proptest::prelude::*;

fn coordinate() -> impl Strategy<Value = Coordinate> {
    (-89.0_f64..89.0, -179.0_f64..179.0).prop_map(|(lat, lng)| Coordinate::new_unchecked(lat, lng))
}

/// Positions within roughly a kilometre of a survey field.
fn field_coordinate() -> impl Strategy<Value = Coordinate> {
    (-0.01_f64..0.01, -0.01_f64..0.01)
        .prop_map(|(dlat, dlng)| Coordinate::new_unchecked(25.0 + dlat, -100.0 + dlng))
}

fn site() -> impl Strategy<Value = SiteResult> {
    (field_coordinate(), 0.0_f64..100.0, 0.0_f64..60.0, 0.0_f64..60.0).prop_map(
        |(coordinate, water, dry, green)| SiteResult {
            image: String::new(),
            mask: String::new(),
            coordinate,
            distribution: Distribution::new()
                .with(Category::Water, water)
                .with(Category::DryVegetation, dry)
                .with(Category::GreenVegetation, green),
        },
    )
}

/// Order-independent key for comparing waypoint multisets.
fn sorted(points: &[Coordinate]) -> Vec<(u64, u64)> {
    let mut keys: Vec<_> = points
        .iter()
        .map(|p| (p.latitude.to_bits(), p.longitude.to_bits()))
        .collect();
    keys.sort_unstable();
    keys
}

// ============================================================================
// GEOMETRY
// ============================================================================

mod geometry_properties {
    use super::*;

    proptest! {
        #[test]
        fn distance_is_symmetric(a in coordinate(), b in coordinate()) {
            prop_assert_eq!(geo_math::distance(a, b), geo_math::distance(b, a));
        }

        #[test]
        fn distance_to_self_is_zero(a in coordinate()) {
            prop_assert_eq!(geo_math::distance(a, a), 0);
        }

        #[test]
        fn matrix_is_symmetric(points in prop::collection::vec(coordinate(), 1..10)) {
            let matrix = DistanceMatrix::from_points(&points);
            for i in 0..matrix.len() {
                prop_assert_eq!(matrix.get(i, i), 0);
                for j in 0..matrix.len() {
                    prop_assert_eq!(matrix.get(i, j), matrix.get(j, i));
                }
            }
        }
    }
}

// ============================================================================
// TOUR
// ============================================================================

mod tour_properties {
    use super::*;

    fn config(solver: TourSolverKind) -> TourConfig {
        TourConfig {
            solver,
            max_iterations: Some(30),
            ..TourConfig::default()
        }
    }

    fn solver() -> impl Strategy<Value = TourSolverKind> {
        prop_oneof![
            Just(TourSolverKind::GuidedLocalSearch),
            Just(TourSolverKind::NearestNeighbor),
            Just(TourSolverKind::Exact),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn optimize_is_a_permutation(
            start in field_coordinate(),
            waypoints in prop::collection::vec(field_coordinate(), 0..14),
            solver in solver(),
        ) {
            let mission = Mission::new("p", Some(start)).with_waypoints(waypoints.clone());
            let optimized = optimize(mission, &config(solver)).unwrap();
            prop_assert_eq!(sorted(&optimized.waypoints), sorted(&waypoints));
        }

        #[test]
        fn optimize_never_lengthens_the_tour(
            start in field_coordinate(),
            waypoints in prop::collection::vec(field_coordinate(), 0..14),
            solver in solver(),
        ) {
            let before = geo_math::closed_tour_length(start, &waypoints);
            let mission = Mission::new("p", Some(start)).with_waypoints(waypoints);
            let optimized = optimize(mission, &config(solver)).unwrap();
            let after = geo_math::closed_tour_length(start, &optimized.waypoints);
            prop_assert!(after <= before, "{} > {}", after, before);
        }

        #[test]
        fn optimize_two_waypoints_is_idempotent(
            start in field_coordinate(),
            a in field_coordinate(),
            b in field_coordinate(),
        ) {
            let tour = config(TourSolverKind::GuidedLocalSearch);
            let mission = Mission::new("p", Some(start)).with_waypoints(vec![a, b]);
            let once = optimize(mission, &tour).unwrap();
            let twice = optimize(once.clone(), &tour).unwrap();
            prop_assert_eq!(
                geo_math::closed_tour_length(start, &once.waypoints),
                geo_math::closed_tour_length(start, &twice.waypoints)
            );
        }
    }
}

// ============================================================================
// AREA
// ============================================================================

mod area_properties {
    use super::*;

    proptest! {
        #[test]
        fn single_point_area_is_that_point(p in coordinate()) {
            prop_assert_eq!(process_area(&[p], &MissionConfig::default()).unwrap(), vec![p]);
        }

        #[test]
        fn edge_neighbours_respect_spacing(
            lat in -60.0_f64..60.0,
            lng in -170.0_f64..170.0,
            height in 0.002_f64..0.05,
            width in 0.0001_f64..0.05,
            spacing in 20_u32..200,
            sweep in prop_oneof![Just(SweepPattern::ZigZag), Just(SweepPattern::Boustrophedon)],
        ) {
            let mut config = MissionConfig::default();
            config.area.min_spacing_m = spacing;
            config.area.sweep = sweep;
            let corners = [
                Coordinate::new_unchecked(lat, lng),
                Coordinate::new_unchecked(lat + height, lng + width),
            ];
            let lattice = process_area(&corners, &config).unwrap();

            prop_assert!(lattice.len() >= 4);
            prop_assert_eq!(lattice.len() % 2, 0);
            prop_assert!(lattice.len() <= config.waypoint_limit);

            // Edge points sit on the two rectangle sides; consecutive points
            // on the same side must be at least `spacing` apart.
            for side in [lng, lng + width] {
                let mut edge: Vec<_> = lattice
                    .iter()
                    .filter(|p| (p.longitude - side).abs() < 1e-12)
                    .copied()
                    .collect();
                edge.sort_by(|a, b| a.latitude.total_cmp(&b.latitude));
                for pair in edge.windows(2) {
                    prop_assert!(geo_math::distance(pair[0], pair[1]) >= spacing);
                }
            }
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

mod selection_properties {
    use super::*;

    proptest! {
        #[test]
        fn default_selection_respects_thresholds(results in prop::collection::vec(site(), 0..40)) {
            let config = SelectionConfig::default();
            let kept = select(&results, &FilterPipeline::default_for(&config));
            for r in &kept {
                prop_assert!(r.distribution.get(Category::Water) <= 40.0);
            }
            for (i, a) in kept.iter().enumerate() {
                for b in &kept[i + 1..] {
                    let gap = geo_math::distance(a.coordinate, b.coordinate);
                    prop_assert!(gap >= config.min_spacing_m);
                }
            }
        }

        #[test]
        fn selection_is_a_subset(results in prop::collection::vec(site(), 0..40)) {
            let config = SelectionConfig::default();
            let kept = select(&results, &FilterPipeline::default_for(&config));
            prop_assert!(kept.len() <= results.len());
            for r in &kept {
                prop_assert!(results.contains(r));
            }
        }

        #[test]
        fn fallback_is_never_empty_for_candidates(results in prop::collection::vec(site(), 1..40)) {
            let selection =
                select_with_fallback(&results, &SelectionConfig::default(), 100).unwrap();
            prop_assert!(!selection.results.is_empty());
        }
    }
}
