//! Guided local search over closed tours.
//!
//! The search alternates two phases until the budget runs out:
//!
//! 1. **Local search** under the augmented cost
//!    `cost(a, b) + lambda * penalty(a, b)`, applying improving 2-opt
//!    (segment reversal) and relocate (move one node) moves until none
//!    is left.
//! 2. **Penalize** the arcs of the resulting local optimum that have the
//!    highest utility `cost / (1 + penalty)`, so the next local search is
//!    pushed away from them.
//!
//! `lambda` is fixed after the first local optimum as
//! `penalty_factor * cost(local optimum) / node_count`.
//!
//! The best tour under the real (unpenalized) cost is kept throughout and
//! only replaced on strict improvement, so running longer never yields a
//! worse result.

use crate::diagnostics::Clock;
use crate::matrix::DistanceMatrix;
use crate::tour::{SearchBudget, StopReason};

/// Improvements smaller than this are treated as float noise.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Result of a guided local search run.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    /// Best visiting order found (depot excluded).
    pub order: Vec<usize>,
    /// Completed penalize iterations.
    pub iterations: u64,
    /// Why the search stopped.
    pub stop: StopReason,
}

/// Arc penalties and the augmented cost function.
struct Landscape<'m> {
    matrix: &'m DistanceMatrix,
    penalties: Vec<u32>,
    lambda: f64,
}

impl<'m> Landscape<'m> {
    fn new(matrix: &'m DistanceMatrix) -> Self {
        Self {
            matrix,
            penalties: vec![0; matrix.len() * matrix.len()],
            lambda: 0.0,
        }
    }

    fn penalty(&self, a: usize, b: usize) -> u32 {
        self.penalties[a * self.matrix.len() + b]
    }

    fn augmented(&self, a: usize, b: usize) -> f64 {
        f64::from(self.matrix.get(a, b)) + self.lambda * f64::from(self.penalty(a, b))
    }

    /// Penalize every arc of `route` whose utility equals the maximum.
    fn penalize(&mut self, route: &[usize]) {
        let m = route.len();
        let utility = |a: usize, b: usize| {
            f64::from(self.matrix.get(a, b)) / (1.0 + f64::from(self.penalty(a, b)))
        };
        let max_utility = (0..m)
            .map(|i| utility(route[i], route[(i + 1) % m]))
            .fold(f64::NEG_INFINITY, f64::max);

        let targets: Vec<(usize, usize)> = (0..m)
            .map(|i| (route[i], route[(i + 1) % m]))
            .filter(|&(a, b)| (utility(a, b) - max_utility).abs() <= IMPROVEMENT_EPSILON)
            .collect();

        let n = self.matrix.len();
        for (a, b) in targets {
            self.penalties[a * n + b] += 1;
            self.penalties[b * n + a] += 1;
        }
    }

    /// Apply improving moves under the augmented cost until none remain.
    ///
    /// Returns `false` if the time budget expired before convergence.
    fn descend<C: Clock>(&self, route: &mut Vec<usize>, budget: &SearchBudget<'_, C>) -> bool {
        loop {
            if budget.time_expired() {
                return false;
            }
            let two_opt = self.two_opt_pass(route);
            let relocate = self.relocate_pass(route);
            if !two_opt && !relocate {
                return true;
            }
        }
    }

    /// One sweep of 2-opt moves. `route[0]` is the depot and never moves.
    fn two_opt_pass(&self, route: &mut [usize]) -> bool {
        let m = route.len();
        let mut improved = false;
        for i in 1..m.saturating_sub(1) {
            for j in (i + 1)..m {
                let a = route[i - 1];
                let b = route[i];
                let c = route[j];
                let d = route[(j + 1) % m];
                let delta = self.augmented(a, c) + self.augmented(b, d)
                    - self.augmented(a, b)
                    - self.augmented(c, d);
                if delta < -IMPROVEMENT_EPSILON {
                    route[i..=j].reverse();
                    improved = true;
                }
            }
        }
        improved
    }

    /// Relocate moves: take one waypoint out and reinsert it between two
    /// other consecutive nodes. Restarts the sweep after every move.
    fn relocate_pass(&self, route: &mut Vec<usize>) -> bool {
        let m = route.len();
        let mut improved = false;
        'sweep: loop {
            for i in 1..m {
                let prev = route[i - 1];
                let node = route[i];
                let next = route[(i + 1) % m];
                let removal_gain = self.augmented(prev, node) + self.augmented(node, next)
                    - self.augmented(prev, next);

                for k in 0..m {
                    if k == i || k + 1 == i {
                        continue;
                    }
                    let x = route[k];
                    let y = route[(k + 1) % m];
                    let insertion_cost =
                        self.augmented(x, node) + self.augmented(node, y) - self.augmented(x, y);
                    if insertion_cost - removal_gain < -IMPROVEMENT_EPSILON {
                        let moved = route.remove(i);
                        let at = if k < i { k + 1 } else { k };
                        route.insert(at, moved);
                        improved = true;
                        continue 'sweep;
                    }
                }
            }
            return improved;
        }
    }
}

/// Run guided local search starting from `initial` (depot excluded).
pub(crate) fn search<C: Clock>(
    matrix: &DistanceMatrix,
    initial: &[usize],
    penalty_factor: f64,
    budget: &SearchBudget<'_, C>,
) -> Outcome {
    let mut best = initial.to_vec();
    let mut best_cost = matrix.tour_cost(&best);

    // With two or fewer waypoints every order has the same closed cost.
    if initial.len() <= 2 {
        return Outcome {
            order: best,
            iterations: 0,
            stop: StopReason::Converged,
        };
    }

    let mut route = Vec::with_capacity(initial.len() + 1);
    route.push(0);
    route.extend_from_slice(initial);

    let mut landscape = Landscape::new(matrix);
    let mut iterations = 0u64;

    let stop = loop {
        if budget.iterations_exhausted(iterations) {
            break StopReason::IterationLimit;
        }

        let converged = landscape.descend(&mut route, budget);
        let cost = matrix.tour_cost(&route[1..]);
        if cost < best_cost {
            best_cost = cost;
            best.copy_from_slice(&route[1..]);
            tracing::trace!(iteration = iterations, cost_m = cost, "new best tour");
        }
        if !converged {
            break StopReason::TimeLimit;
        }

        if iterations == 0 {
            #[allow(clippy::cast_precision_loss)]
            let lambda = penalty_factor * cost as f64 / route.len() as f64;
            if lambda <= 0.0 {
                // Penalties would not change the landscape.
                break StopReason::Converged;
            }
            landscape.lambda = lambda;
        }

        landscape.penalize(&route);
        iterations += 1;
    };

    tracing::debug!(
        iterations,
        cost_m = best_cost,
        stop = ?stop,
        "guided local search finished"
    );

    Outcome {
        order: best,
        iterations,
        stop,
    }
}
