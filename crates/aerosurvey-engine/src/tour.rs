//! Tour optimization: reorder a mission's waypoints into a short closed
//! flight that starts and ends at the mission start.
//!
//! This module defines the [`TourSolver`] trait for pluggable solving
//! strategies and the [`TourSolverKind`] enum for runtime selection.
//! Every solver receives the caller's current order as a hint and never
//! returns a tour that costs more than it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::TourConfig;
use crate::diagnostics::{Clock, SystemClock};
use crate::gls;
use crate::matrix::DistanceMatrix;
use crate::types::{EngineError, Mission};

/// Largest node count (depot included) solved exactly by
/// [`TourSolverKind::Exact`]. Larger instances use guided local search.
pub const EXACT_NODE_LIMIT: usize = 12;

/// Selects which tour solving strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourSolverKind {
    /// Path-cheapest-arc construction followed by guided local search
    /// (2-opt and relocate moves) until the time budget runs out.
    #[default]
    GuidedLocalSearch,

    /// Path-cheapest-arc construction only: from the current node, always
    /// fly to the nearest unvisited waypoint.
    NearestNeighbor,

    /// Held-Karp dynamic programming. Optimal, but only for up to
    /// [`EXACT_NODE_LIMIT`] nodes; larger instances fall back to
    /// [`GuidedLocalSearch`](Self::GuidedLocalSearch).
    Exact,
}

impl TourSolverKind {
    /// Short name for reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GuidedLocalSearch => "guided-local-search",
            Self::NearestNeighbor => "nearest-neighbor",
            Self::Exact => "exact",
        }
    }
}

/// A closed tour over the matrix nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    /// Visiting order as node indices. The depot (node 0) is implicit at
    /// both ends and does not appear here.
    pub order: Vec<usize>,
    /// Closed cost in metres, depot to depot.
    pub cost: u64,
}

impl Tour {
    /// Wrap an order, computing its closed cost.
    #[must_use]
    pub fn new(matrix: &DistanceMatrix, order: Vec<usize>) -> Self {
        let cost = matrix.tour_cost(&order);
        Self { order, cost }
    }
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left to improve (trivial instance, exact solve, or a
    /// search that cannot make further progress).
    Converged,
    /// `max_iterations` was reached.
    IterationLimit,
    /// The wall-clock budget ran out.
    TimeLimit,
}

/// Outcome of a solver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourReport {
    /// Strategy that produced the tour.
    pub solver: TourSolverKind,
    /// The best tour found.
    pub tour: Tour,
    /// Cost of the starting solution before improvement.
    pub initial_cost: u64,
    /// Number of completed guided-local-search iterations.
    pub iterations: u64,
    /// Why the search stopped.
    pub stop: StopReason,
}

/// The instance handed to a [`TourSolver`].
#[derive(Debug, Clone, Copy)]
pub struct TourProblem<'a> {
    /// Distances between all nodes; node 0 is the depot.
    pub matrix: &'a DistanceMatrix,
    /// Current visiting order. Ignored unless it is a permutation of
    /// `1..matrix.len()`.
    pub hint: &'a [usize],
    /// Guided local search lambda coefficient.
    pub penalty_factor: f64,
}

impl TourProblem<'_> {
    /// The hint, if it is a valid visiting order for the matrix.
    fn valid_hint(&self) -> Option<&[usize]> {
        let n = self.matrix.len();
        if self.hint.len() + 1 != n {
            return None;
        }
        let mut seen = vec![false; n];
        for &node in self.hint {
            if node == 0 || node >= n || seen[node] {
                return None;
            }
            seen[node] = true;
        }
        Some(self.hint)
    }

    /// The cheaper of the constructed order and the hint.
    fn seed(&self) -> (Tour, Tour) {
        let constructed = Tour::new(self.matrix, path_cheapest_arc(self.matrix));
        let seed = match self.valid_hint() {
            Some(hint) => {
                let hinted = Tour::new(self.matrix, hint.to_vec());
                if hinted.cost < constructed.cost {
                    hinted
                } else {
                    constructed.clone()
                }
            }
            None => constructed.clone(),
        };
        (constructed, seed)
    }
}

/// Wall-clock and iteration limits for a search.
pub struct SearchBudget<'a, C: Clock> {
    clock: &'a C,
    started: C::Instant,
    time_limit: Duration,
    max_iterations: Option<u64>,
}

impl<'a, C: Clock> SearchBudget<'a, C> {
    /// Start a budget now.
    #[must_use]
    pub fn start(clock: &'a C, time_limit: Duration, max_iterations: Option<u64>) -> Self {
        Self {
            started: clock.now(),
            clock,
            time_limit,
            max_iterations,
        }
    }

    /// Start a budget from the tour configuration.
    #[must_use]
    pub fn from_config(clock: &'a C, config: &TourConfig) -> Self {
        Self::start(clock, config.time_budget, config.max_iterations)
    }

    /// `true` once the wall-clock limit has passed.
    #[must_use]
    pub fn time_expired(&self) -> bool {
        self.clock.elapsed(&self.started) >= self.time_limit
    }

    /// `true` once `iterations` reaches the iteration cap, if any.
    #[must_use]
    pub fn iterations_exhausted(&self, iterations: u64) -> bool {
        self.max_iterations.is_some_and(|max| iterations >= max)
    }
}

/// Trait for tour solving strategies.
///
/// Input: a symmetric distance matrix with the depot at node 0.
/// Output: a visiting order over every other node exactly once.
pub trait TourSolver {
    /// Solve the instance within the budget.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoFeasibleTour`] when the instance has no
    /// waypoints to order.
    fn solve<C: Clock>(
        &self,
        problem: &TourProblem<'_>,
        budget: &SearchBudget<'_, C>,
    ) -> Result<TourReport, EngineError>;
}

impl TourSolver for TourSolverKind {
    fn solve<C: Clock>(
        &self,
        problem: &TourProblem<'_>,
        budget: &SearchBudget<'_, C>,
    ) -> Result<TourReport, EngineError> {
        if problem.matrix.len() < 2 {
            return Err(EngineError::NoFeasibleTour);
        }
        match *self {
            Self::GuidedLocalSearch => Ok(solve_guided(problem, budget)),
            Self::NearestNeighbor => Ok(solve_nearest_neighbor(problem)),
            Self::Exact if problem.matrix.len() <= EXACT_NODE_LIMIT => Ok(solve_exact(problem)),
            Self::Exact => {
                tracing::debug!(
                    nodes = problem.matrix.len(),
                    limit = EXACT_NODE_LIMIT,
                    "instance too large for exact solve, using guided local search"
                );
                Ok(solve_guided(problem, budget))
            }
        }
    }
}

fn solve_nearest_neighbor(problem: &TourProblem<'_>) -> TourReport {
    let (constructed, seed) = problem.seed();
    TourReport {
        solver: TourSolverKind::NearestNeighbor,
        initial_cost: constructed.cost,
        tour: seed,
        iterations: 0,
        stop: StopReason::Converged,
    }
}

fn solve_guided<C: Clock>(problem: &TourProblem<'_>, budget: &SearchBudget<'_, C>) -> TourReport {
    let (constructed, seed) = problem.seed();
    let outcome = gls::search(problem.matrix, &seed.order, problem.penalty_factor, budget);
    TourReport {
        solver: TourSolverKind::GuidedLocalSearch,
        initial_cost: constructed.cost,
        tour: Tour::new(problem.matrix, outcome.order),
        iterations: outcome.iterations,
        stop: outcome.stop,
    }
}

fn solve_exact(problem: &TourProblem<'_>) -> TourReport {
    let (constructed, seed) = problem.seed();
    let optimal = Tour::new(problem.matrix, held_karp(problem.matrix));
    TourReport {
        solver: TourSolverKind::Exact,
        initial_cost: constructed.cost,
        tour: if optimal.cost <= seed.cost { optimal } else { seed },
        iterations: 0,
        stop: StopReason::Converged,
    }
}

/// Path-cheapest-arc construction.
///
/// Starting at the depot, repeatedly extend the path with the unvisited
/// node reached by the cheapest arc from the path's last node. Ties go to
/// the lowest node index.
#[must_use]
pub fn path_cheapest_arc(matrix: &DistanceMatrix) -> Vec<usize> {
    let n = matrix.len();
    if n < 2 {
        return Vec::new();
    }
    let mut visited = vec![false; n];
    visited[0] = true;
    let mut order = Vec::with_capacity(n - 1);
    let mut current = 0;

    for _ in 1..n {
        let row = matrix.row(current);
        let Some(next) = (1..n)
            .filter(|&j| !visited[j])
            .min_by_key(|&j| (row[j], j))
        else {
            break;
        };
        visited[next] = true;
        order.push(next);
        current = next;
    }

    order
}

/// Optimal closed tour by Held-Karp dynamic programming.
///
/// `O(2^k * k^2)` for `k = matrix.len() - 1` waypoints; callers keep
/// `matrix.len()` at or below [`EXACT_NODE_LIMIT`].
fn held_karp(matrix: &DistanceMatrix) -> Vec<usize> {
    let k = matrix.len().saturating_sub(1);
    if k == 0 {
        return Vec::new();
    }
    let full = 1usize << k;
    let mut cost = vec![u64::MAX; full * k];
    let mut parent = vec![usize::MAX; full * k];

    for j in 0..k {
        cost[(1 << j) * k + j] = u64::from(matrix.get(0, j + 1));
    }

    for mask in 1..full {
        for last in 0..k {
            if mask & (1 << last) == 0 {
                continue;
            }
            let current = cost[mask * k + last];
            if current == u64::MAX {
                continue;
            }
            for next in 0..k {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let extended = mask | (1 << next);
                let candidate = current + u64::from(matrix.get(last + 1, next + 1));
                if candidate < cost[extended * k + next] {
                    cost[extended * k + next] = candidate;
                    parent[extended * k + next] = last;
                }
            }
        }
    }

    let all = full - 1;
    let Some(mut last) = (0..k).min_by_key(|&j| {
        cost[all * k + j].saturating_add(u64::from(matrix.get(j + 1, 0)))
    }) else {
        return Vec::new();
    };

    let mut mask = all;
    let mut order = Vec::with_capacity(k);
    loop {
        order.push(last + 1);
        let previous = parent[mask * k + last];
        mask &= !(1 << last);
        if previous == usize::MAX {
            break;
        }
        last = previous;
    }
    order.reverse();
    order
}

/// Solve the closed tour for `matrix` with the configured solver.
///
/// The identity order `1..matrix.len()` is used as the hint.
///
/// # Errors
///
/// Returns [`EngineError::NoFeasibleTour`] if the matrix has fewer than
/// two nodes.
pub fn solve_tour<C: Clock>(
    matrix: &DistanceMatrix,
    config: &TourConfig,
    clock: &C,
) -> Result<TourReport, EngineError> {
    let hint: Vec<usize> = (1..matrix.len()).collect();
    let problem = TourProblem {
        matrix,
        hint: &hint,
        penalty_factor: config.penalty_factor,
    };
    let budget = SearchBudget::from_config(clock, config);
    config.solver.solve(&problem, &budget)
}

/// Reorder the mission's waypoints into a short closed tour from the
/// start point.
///
/// Missions with zero or one waypoint are returned unchanged. When the
/// solver finds no tour the mission is also returned unchanged.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if the mission has waypoints
/// but no start point.
pub fn optimize(mission: Mission, config: &TourConfig) -> Result<Mission, EngineError> {
    optimize_with_clock(mission, config, &SystemClock).map(|(mission, _)| mission)
}

/// Like [`optimize`] but with an explicit clock, also returning the
/// solver report when a solve ran.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if the mission has waypoints
/// but no start point.
pub fn optimize_with_clock<C: Clock>(
    mission: Mission,
    config: &TourConfig,
    clock: &C,
) -> Result<(Mission, Option<TourReport>), EngineError> {
    let matrix = DistanceMatrix::build(mission.start, &mission.waypoints)?;
    reorder(mission, &matrix, config, clock)
}

/// Reorder the mission's waypoints using a matrix already built for it
/// with [`DistanceMatrix::build`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `matrix` does not have one
/// node per waypoint plus the start.
pub fn reorder<C: Clock>(
    mut mission: Mission,
    matrix: &DistanceMatrix,
    config: &TourConfig,
    clock: &C,
) -> Result<(Mission, Option<TourReport>), EngineError> {
    if mission.waypoints.len() <= 1 {
        tracing::debug!(
            mission = %mission.id,
            waypoints = mission.waypoints.len(),
            "nothing to order"
        );
        return Ok((mission, None));
    }
    if matrix.len() != mission.waypoints.len() + 1 {
        return Err(EngineError::InvalidInput(format!(
            "matrix has {} nodes for {} waypoints",
            matrix.len(),
            mission.waypoints.len()
        )));
    }

    tracing::debug!(
        mission = %mission.id,
        nodes = matrix.len(),
        solver = config.solver.name(),
        "solving tour"
    );

    match solve_tour(matrix, config, clock) {
        Ok(report) => {
            let input_cost = matrix.tour_cost(&(1..matrix.len()).collect::<Vec<_>>());
            mission.waypoints = report
                .tour
                .order
                .iter()
                .map(|&node| mission.waypoints[node - 1])
                .collect();
            tracing::info!(
                mission = %mission.id,
                solver = report.solver.name(),
                input_cost_m = input_cost,
                cost_m = report.tour.cost,
                iterations = report.iterations,
                stop = ?report.stop,
                "tour optimized"
            );
            Ok((mission, Some(report)))
        }
        Err(EngineError::NoFeasibleTour) => {
            tracing::warn!(
                mission = %mission.id,
                "no feasible tour found, keeping the current waypoint order"
            );
            Ok((mission, None))
        }
        Err(e) => Err(e),
    }
}
