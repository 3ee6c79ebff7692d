//! Site selection: reduce classified captures to a set of survey sites.
//!
//! A [`FilterPipeline`] runs its stages strictly left to right. The
//! default pipeline drops sites by classification and then thins the
//! survivors spatially; the soft pipeline only thins. Every stage keeps
//! a subsequence of its input, so a site removed early never comes back.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::config::SelectionConfig;
use crate::geo_math::{self, METERS_PER_DEGREE};
use crate::types::{Category, Coordinate, EngineError, SiteResult};

/// A pure transformation over an ordered list of site results.
pub trait Filter {
    /// Apply the filter, returning the kept results in output order.
    fn apply(&self, results: Vec<SiteResult>) -> Vec<SiteResult>;
}

/// Drops sites that carry little survey value.
///
/// A site is discarded when its water share exceeds `max_water_pct`,
/// when it has no dry and no green vegetation at all, or (if set) when
/// its exposed soil share exceeds `max_exposed_soil_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationFilter {
    /// Water ceiling in percent.
    pub max_water_pct: f64,
    /// Optional exposed soil ceiling in percent.
    #[serde(default)]
    pub max_exposed_soil_pct: Option<f64>,
}

impl ClassificationFilter {
    /// `true` if `result` should be kept.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn keeps(&self, result: &SiteResult) -> bool {
        let d = &result.distribution;
        if d.get(Category::Water) > self.max_water_pct {
            return false;
        }
        if d.get(Category::DryVegetation) == 0.0 && d.get(Category::GreenVegetation) == 0.0 {
            return false;
        }
        self.max_exposed_soil_pct
            .is_none_or(|max| d.get(Category::ExposedSoil) <= max)
    }
}

impl Default for ClassificationFilter {
    fn default() -> Self {
        Self {
            max_water_pct: SelectionConfig::DEFAULT_MAX_WATER_PCT,
            max_exposed_soil_pct: None,
        }
    }
}

/// Selects one filter at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Keep results whose `category` share is `>= threshold`.
    GreaterThan {
        /// Category to compare.
        category: Category,
        /// Inclusive lower bound in percent.
        threshold: f64,
    },
    /// Keep results whose `category` share is `<= threshold`.
    LessThan {
        /// Category to compare.
        category: Category,
        /// Inclusive upper bound in percent.
        threshold: f64,
    },
    /// Classification thresholds, see [`ClassificationFilter`].
    Classification(ClassificationFilter),
    /// Greedy spatial diversity, see [`distance_filter`].
    Distance {
        /// Minimum separation in metres between kept sites.
        min_spacing_m: u32,
    },
    /// A nested pipeline.
    Pipeline(FilterPipeline),
}

impl Filter for FilterKind {
    fn apply(&self, results: Vec<SiteResult>) -> Vec<SiteResult> {
        match self {
            Self::GreaterThan {
                category,
                threshold,
            } => retain(results, |r| r.distribution.get(*category) >= *threshold),
            Self::LessThan {
                category,
                threshold,
            } => retain(results, |r| r.distribution.get(*category) <= *threshold),
            Self::Classification(filter) => retain(results, |r| filter.keeps(r)),
            Self::Distance { min_spacing_m } => distance_filter(results, *min_spacing_m),
            Self::Pipeline(pipeline) => pipeline.apply(results),
        }
    }
}

fn retain(mut results: Vec<SiteResult>, keep: impl Fn(&SiteResult) -> bool) -> Vec<SiteResult> {
    results.retain(keep);
    results
}

/// Ordered composition of filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterPipeline {
    /// Stages in application order.
    pub stages: Vec<FilterKind>,
}

impl FilterPipeline {
    /// Pipeline running `stages` in order.
    #[must_use]
    pub const fn new(stages: Vec<FilterKind>) -> Self {
        Self { stages }
    }

    /// Append a stage.
    #[must_use]
    pub fn then(mut self, stage: FilterKind) -> Self {
        self.stages.push(stage);
        self
    }

    /// Classification followed by spatial diversity.
    #[must_use]
    pub fn default_for(config: &SelectionConfig) -> Self {
        Self::new(vec![
            FilterKind::Classification(ClassificationFilter {
                max_water_pct: config.max_water_pct,
                max_exposed_soil_pct: config.max_exposed_soil_pct,
            }),
            FilterKind::Distance {
                min_spacing_m: config.min_spacing_m,
            },
        ])
    }

    /// Spatial diversity only.
    #[must_use]
    pub fn soft_for(config: &SelectionConfig) -> Self {
        Self::new(vec![FilterKind::Distance {
            min_spacing_m: config.min_spacing_m,
        }])
    }
}

impl Filter for FilterPipeline {
    fn apply(&self, results: Vec<SiteResult>) -> Vec<SiteResult> {
        self.stages.iter().fold(results, |acc, stage| {
            let before = acc.len();
            let kept = stage.apply(acc);
            tracing::debug!(stage = ?stage, before, after = kept.len(), "filter stage");
            kept
        })
    }
}

/// Greedy spatial diversity filter.
///
/// Results are stably sorted by descending [`SiteResult::priority`] and
/// accepted one by one when they lie at least `min_spacing_m` from every
/// result accepted so far. Output is in acceptance order.
#[must_use]
pub fn distance_filter(mut results: Vec<SiteResult>, min_spacing_m: u32) -> Vec<SiteResult> {
    results.sort_by(|a, b| b.priority().total_cmp(&a.priority()));

    let mut accepted: Vec<SiteResult> = Vec::with_capacity(results.len());
    let mut index: RTree<GeomWithData<[f64; 2], usize>> = RTree::new();

    for candidate in results {
        let c = candidate.coordinate;
        let conflict = index
            .locate_in_envelope_intersecting(&search_envelope(c, min_spacing_m))
            .any(|near| geo_math::distance(c, accepted[near.data].coordinate) < min_spacing_m);
        if !conflict {
            index.insert(GeomWithData::new([c.longitude, c.latitude], accepted.len()));
            accepted.push(candidate);
        }
    }
    accepted
}

/// Axis-aligned `[lng, lat]` box guaranteed to contain every point within
/// `radius_m` of `center`.
fn search_envelope(center: Coordinate, radius_m: u32) -> AABB<[f64; 2]> {
    let dlat = (f64::from(radius_m) + 1.0) * 1.5 / METERS_PER_DEGREE;
    let south = (center.latitude - dlat).max(-90.0);
    let north = (center.latitude + dlat).min(90.0);
    let narrowest = south.abs().max(north.abs()).to_radians().cos();

    let dlng = if narrowest > 1e-6 { dlat / narrowest } else { f64::INFINITY };
    let (west, east) = if center.longitude - dlng < -180.0 || center.longitude + dlng > 180.0 {
        (-180.0, 180.0)
    } else {
        (center.longitude - dlng, center.longitude + dlng)
    };
    AABB::from_corners([west, south], [east, north])
}

/// Run `pipeline` over a copy of `results`.
#[must_use]
pub fn select(results: &[SiteResult], pipeline: &FilterPipeline) -> Vec<SiteResult> {
    pipeline.apply(results.to_vec())
}

/// Which pipeline produced a [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineChoice {
    /// Classification then spatial diversity.
    Default,
    /// Spatial diversity only, used when the default pipeline kept nothing.
    Soft,
}

/// Outcome of [`select_with_fallback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected sites, highest priority first.
    pub results: Vec<SiteResult>,
    /// Pipeline that produced them.
    pub pipeline: PipelineChoice,
}

/// Select survey sites, falling back to the soft pipeline when the
/// default one keeps nothing.
///
/// At most `waypoint_limit` sites are returned; the highest-priority
/// ones are kept.
///
/// # Errors
///
/// Returns [`EngineError::EmptyCandidateSet`] when both pipelines come
/// back empty (including when `results` is empty).
pub fn select_with_fallback(
    results: &[SiteResult],
    config: &SelectionConfig,
    waypoint_limit: usize,
) -> Result<Selection, EngineError> {
    let mut pipeline = PipelineChoice::Default;
    let mut selected = select(results, &FilterPipeline::default_for(config));

    if selected.is_empty() && !results.is_empty() {
        tracing::warn!(
            candidates = results.len(),
            "default selection kept no sites, falling back to the soft pipeline"
        );
        pipeline = PipelineChoice::Soft;
        selected = select(results, &FilterPipeline::soft_for(config));
    }

    if selected.is_empty() {
        return Err(EngineError::EmptyCandidateSet);
    }

    if selected.len() > waypoint_limit {
        tracing::warn!(
            selected = selected.len(),
            limit = waypoint_limit,
            "selection exceeds the waypoint limit, keeping the highest-priority sites"
        );
        selected.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
        selected.truncate(waypoint_limit);
    }

    tracing::info!(
        candidates = results.len(),
        selected = selected.len(),
        pipeline = ?pipeline,
        "sites selected"
    );
    Ok(Selection {
        results: selected,
        pipeline,
    })
}
