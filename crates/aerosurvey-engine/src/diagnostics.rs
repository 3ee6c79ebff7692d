//! Planner diagnostics: timing, counts, and solver metrics for each stage.
//!
//! Every planner operation collects diagnostics alongside its mission so
//! callers can tune spacing, budgets, and solvers against real inputs.
//!
//! Time is read through the [`Clock`] trait. [`SystemClock`] uses the
//! `web-time` crate, which maps to `performance.now()` on WASM and
//! `std::time::Instant` elsewhere; tests substitute a stepping clock.
//!
//! Durations are serialized as fractional seconds (`f64`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::area::SweepPattern;
use crate::config::duration_serde;
use crate::selection::PipelineChoice;
use crate::tour::{StopReason, TourSolverKind};

/// Monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single planner operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDiagnostics {
    /// Operation name (`plan_sites`, `plan_area`, ...).
    pub operation: String,
    /// Stages in execution order. Skipped stages are absent.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the operation (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the produced mission.
    pub summary: PlanSummary,
}

/// Diagnostics for a single planner stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Human-readable stage name.
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Site selection.
    Selection {
        /// Candidate results before filtering.
        input_count: usize,
        /// Results kept (after the waypoint cap).
        selected_count: usize,
        /// Which pipeline produced the selection.
        pipeline: PipelineChoice,
        /// Minimum spacing enforced between sites (metres).
        min_spacing_m: u32,
    },
    /// Distance matrix construction.
    Matrix {
        /// Nodes in the matrix, start included.
        node_count: usize,
    },
    /// Tour optimization.
    Tour {
        /// Strategy that produced the tour.
        solver: TourSolverKind,
        /// Closed cost of the constructed starting tour (metres).
        initial_cost_m: u64,
        /// Closed cost of the returned tour (metres).
        final_cost_m: u64,
        /// Completed guided-local-search iterations.
        iterations: u64,
        /// Why the search stopped.
        stop: StopReason,
        /// `true` when the solver gave up and the input order was kept.
        degraded: bool,
    },
    /// Area decomposition.
    Area {
        /// Points in the drawn boundary.
        boundary_points: usize,
        /// Points per subdivided edge.
        edge_points: usize,
        /// Points in the produced lattice.
        lattice_points: usize,
        /// Minimum edge spacing (metres).
        min_spacing_m: u32,
        /// Interleave pattern.
        sweep: SweepPattern,
    },
}

/// High-level summary of the produced mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Mission identifier.
    pub mission_id: String,
    /// Waypoints in the final mission.
    pub waypoint_count: usize,
    /// Closed flight length from the start through every waypoint and
    /// back (metres). Zero when the mission has no start.
    pub tour_length_m: u64,
}

impl PlanDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Mission Plan Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Operation: {}  |  Mission: {}",
            self.operation, self.summary.mission_id,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name));
        }

        lines.push(String::new());
        lines.push(format!(
            "Waypoints: {}  |  Tour length: {} m",
            self.summary.waypoint_count, self.summary.tour_length_m,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Selection {
            input_count,
            selected_count,
            pipeline,
            min_spacing_m,
        } => {
            format!("{pipeline:?} {input_count}->{selected_count} sites (spacing={min_spacing_m}m)")
        }
        StageMetrics::Matrix { node_count } => format!("{node_count}x{node_count}"),
        StageMetrics::Tour {
            solver,
            initial_cost_m,
            final_cost_m,
            iterations,
            stop,
            degraded,
        } => {
            if *degraded {
                format!("{} gave up, input order kept", solver.name())
            } else {
                format!(
                    "{} {initial_cost_m}->{final_cost_m} m, {iterations} iters ({stop:?})",
                    solver.name(),
                )
            }
        }
        StageMetrics::Area {
            boundary_points,
            edge_points,
            lattice_points,
            min_spacing_m,
            sweep,
        } => {
            format!(
                "{boundary_points} boundary pts, {edge_points}/edge -> {lattice_points} pts \
                 (spacing={min_spacing_m}m, {sweep:?})",
            )
        }
    }
}

/// Times stages against a [`Clock`] and collects them.
pub(crate) struct StageRecorder<'a, C: Clock> {
    clock: &'a C,
    started: C::Instant,
    stages: Vec<StageDiagnostics>,
}

impl<'a, C: Clock> StageRecorder<'a, C> {
    pub(crate) fn start(clock: &'a C) -> Self {
        Self {
            clock,
            started: clock.now(),
            stages: Vec::new(),
        }
    }

    /// Run `stage`, recording its duration and the metrics it reports.
    pub(crate) fn record<T, E>(
        &mut self,
        name: &str,
        stage: impl FnOnce() -> Result<(T, StageMetrics), E>,
    ) -> Result<T, E> {
        let t0 = self.clock.now();
        let (value, metrics) = stage()?;
        self.stages.push(StageDiagnostics {
            name: name.to_string(),
            duration: self.clock.elapsed(&t0),
            metrics,
        });
        Ok(value)
    }

    pub(crate) fn finish(self, operation: &str, summary: PlanSummary) -> PlanDiagnostics {
        PlanDiagnostics {
            operation: operation.to_string(),
            stages: self.stages,
            total_duration: self.clock.elapsed(&self.started),
            summary,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances a fixed step on every reading.
    struct StepClock {
        now: Cell<Duration>,
        step: Duration,
    }

    impl Clock for StepClock {
        type Instant = Duration;

        fn now(&self) -> Duration {
            let t = self.now.get() + self.step;
            self.now.set(t);
            t
        }

        fn elapsed(&self, since: &Duration) -> Duration {
            self.now().saturating_sub(*since)
        }
    }

    fn summary() -> PlanSummary {
        PlanSummary {
            mission_id: "m-1".to_string(),
            waypoint_count: 6,
            tour_length_m: 3_400,
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let t0 = clock.now();
        let a = clock.elapsed(&t0);
        let b = clock.elapsed(&t0);
        assert!(b >= a);
    }

    #[test]
    fn recorder_times_each_stage() {
        let clock = StepClock {
            now: Cell::new(Duration::ZERO),
            step: Duration::from_millis(2),
        };
        let mut recorder = StageRecorder::start(&clock);
        let value: Result<u8, ()> = recorder.record("Matrix", || {
            Ok((7, StageMetrics::Matrix { node_count: 3 }))
        });
        assert_eq!(value, Ok(7));
        let diag = recorder.finish("optimize", summary());
        assert_eq!(diag.stages.len(), 1);
        assert_eq!(diag.stages[0].name, "Matrix");
        assert_eq!(diag.stages[0].duration, Duration::from_millis(2));
        assert!(diag.total_duration >= diag.stages[0].duration);
    }

    #[test]
    fn recorder_skips_failed_stage() {
        let clock = SystemClock;
        let mut recorder = StageRecorder::start(&clock);
        let value: Result<(), &str> = recorder.record("Tour", || Err("boom"));
        assert_eq!(value, Err("boom"));
        assert!(recorder.finish("optimize", summary()).stages.is_empty());
    }

    #[test]
    fn report_produces_nonempty_string() {
        let diag = PlanDiagnostics {
            operation: "plan_area".to_string(),
            stages: vec![
                StageDiagnostics {
                    name: "Area".to_string(),
                    duration: Duration::from_millis(1),
                    metrics: StageMetrics::Area {
                        boundary_points: 4,
                        edge_points: 3,
                        lattice_points: 6,
                        min_spacing_m: 500,
                        sweep: SweepPattern::ZigZag,
                    },
                },
                StageDiagnostics {
                    name: "Tour".to_string(),
                    duration: Duration::from_millis(9),
                    metrics: StageMetrics::Tour {
                        solver: TourSolverKind::GuidedLocalSearch,
                        initial_cost_m: 3_600,
                        final_cost_m: 3_400,
                        iterations: 120,
                        stop: StopReason::TimeLimit,
                        degraded: false,
                    },
                },
            ],
            total_duration: Duration::from_millis(10),
            summary: summary(),
        };

        let report = diag.report();
        assert!(report.contains("Mission Plan Report"));
        assert!(report.contains("plan_area"));
        assert!(report.contains("guided-local-search 3600->3400 m"));
        assert!(report.contains("Tour length: 3400 m"));
    }

    #[test]
    fn degraded_tour_is_reported() {
        let details = format_metrics(&StageMetrics::Tour {
            solver: TourSolverKind::Exact,
            initial_cost_m: 0,
            final_cost_m: 0,
            iterations: 0,
            stop: StopReason::Converged,
            degraded: true,
        });
        assert!(details.contains("input order kept"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let diag = PlanDiagnostics {
            operation: "optimize".to_string(),
            stages: Vec::new(),
            total_duration: Duration::from_millis(1500),
            summary: summary(),
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    }
}
