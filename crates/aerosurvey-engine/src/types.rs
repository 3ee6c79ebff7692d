//! Shared types for the aerosurvey mission engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A geographic position in decimal degrees (WGS-84).
///
/// Equality is coordinate equality: two values with the same latitude
/// and longitude are the same position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `-90.0..=90.0`.
    pub latitude: f64,
    /// Longitude in degrees, `-180.0..=180.0`.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if either component is not
    /// finite or lies outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EngineError> {
        let coordinate = Self::new_unchecked(latitude, longitude);
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Create a coordinate without range checks.
    ///
    /// Intended for literals and values already known to be valid.
    #[must_use]
    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] describing the offending
    /// component.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EngineError::InvalidInput(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EngineError::InvalidInput(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        Self::new(c.longitude, c.latitude)
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new_unchecked(c.y, c.x)
    }
}

/// Land-cover classes produced by the segmentation model.
///
/// Serialized with the model's numeric class ids so stored
/// distributions stay readable by the classification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Unlabelled pixels. Excluded from every visitor-facing percentage.
    #[serde(rename = "0")]
    Background,
    /// Open water.
    #[serde(rename = "1")]
    Water,
    /// Bare ground.
    #[serde(rename = "2")]
    ExposedSoil,
    /// Dry or dead vegetation. Used as the survey-urgency priority.
    #[serde(rename = "3")]
    DryVegetation,
    /// Healthy vegetation.
    #[serde(rename = "4")]
    GreenVegetation,
}

impl Category {
    /// Every class, in model id order.
    pub const ALL: [Self; 5] = [
        Self::Background,
        Self::Water,
        Self::ExposedSoil,
        Self::DryVegetation,
        Self::GreenVegetation,
    ];

    /// The segmentation model's class id.
    #[must_use]
    pub const fn class_id(self) -> u8 {
        match self {
            Self::Background => 0,
            Self::Water => 1,
            Self::ExposedSoil => 2,
            Self::DryVegetation => 3,
            Self::GreenVegetation => 4,
        }
    }

    /// Mask colour used when rendering segmentation output.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Background => "#000000",
            Self::Water => "#004fff",
            Self::ExposedSoil => "#ffffff",
            Self::DryVegetation => "#8f9107",
            Self::GreenVegetation => "#08920a",
        }
    }
}

/// Per-image coverage percentages keyed by [`Category`].
///
/// Categories that are absent read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution(BTreeMap<Category, f64>);

impl Distribution {
    /// Create an empty distribution.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, category: Category, percent: f64) -> Self {
        self.0.insert(category, percent);
        self
    }

    /// Set the percentage for a category.
    pub fn set(&mut self, category: Category, percent: f64) {
        self.0.insert(category, percent);
    }

    /// Percentage for a category, `0.0` when absent.
    #[must_use]
    pub fn get(&self, category: Category) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    /// Iterate over the stored `(category, percent)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(c, p)| (*c, *p))
    }

    /// Convert per-class pixel counts into percentages.
    ///
    /// `counts` is indexed by [`Category::class_id`]. Percentages are
    /// relative to the non-background pixel total and rounded to two
    /// decimals; the background class is left out. When an image has no
    /// non-background pixels every class reads `0.0`.
    #[must_use]
    pub fn from_pixel_counts(counts: [u64; 5]) -> Self {
        let background = usize::from(Category::Background.class_id());
        let total: u64 = counts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != background)
            .map(|(_, c)| *c)
            .sum();

        let mut distribution = Self::new();
        for category in Category::ALL {
            if category == Category::Background {
                continue;
            }
            let count = counts[usize::from(category.class_id())];
            #[allow(clippy::cast_precision_loss)]
            let percent = if total > 0 {
                (count as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
            } else {
                0.0
            };
            distribution.set(category, percent);
        }
        distribution
    }
}

/// Classification outcome for one captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteResult {
    /// Stored image file name.
    pub image: String,
    /// Stored segmentation mask file name.
    #[serde(default)]
    pub mask: String,
    /// Capture position of the image.
    pub coordinate: Coordinate,
    /// Land-cover percentages for the image.
    pub distribution: Distribution,
}

impl SiteResult {
    /// Survey priority: the dry-vegetation percentage.
    #[must_use]
    pub fn priority(&self) -> f64 {
        self.distribution.get(Category::DryVegetation)
    }
}

/// A survey mission: a start point and an ordered list of waypoints.
///
/// The waypoint order is the visiting order. The start point is the
/// implicit first and last position of the flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Mission identifier assigned by the caller.
    pub id: String,
    /// Launch and recovery position.
    #[serde(default)]
    pub start: Option<Coordinate>,
    /// Waypoints in visiting order.
    #[serde(default)]
    pub waypoints: Vec<Coordinate>,
    /// Classification results that produced the waypoints, if any.
    #[serde(default)]
    pub results: Vec<SiteResult>,
}

impl Mission {
    /// Create an empty mission.
    #[must_use]
    pub fn new(id: impl Into<String>, start: Option<Coordinate>) -> Self {
        Self {
            id: id.into(),
            start,
            waypoints: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Builder-style waypoint setter.
    #[must_use]
    pub fn with_waypoints(mut self, waypoints: Vec<Coordinate>) -> Self {
        self.waypoints = waypoints;
        self
    }

    /// Check the waypoint count against `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the mission carries more
    /// than `limit` waypoints.
    pub fn check_limit(&self, limit: usize) -> Result<(), EngineError> {
        if self.waypoints.len() > limit {
            return Err(EngineError::InvalidInput(format!(
                "mission has {} waypoints, limit is {limit}",
                self.waypoints.len()
            )));
        }
        Ok(())
    }
}

/// Errors produced by the mission engine.
///
/// Every variant is recoverable. [`NoFeasibleTour`](Self::NoFeasibleTour)
/// is absorbed by [`crate::optimize`] and
/// [`EmptyCandidateSet`](Self::EmptyCandidateSet) is only returned once
/// the soft selection fallback has also come up empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum EngineError {
    /// Malformed or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration values are out of range.
    #[error("invalid mission configuration: {0}")]
    InvalidConfig(String),

    /// The solver produced no tour within its budget.
    #[error("no feasible tour found within the search budget")]
    NoFeasibleTour,

    /// Selection removed every candidate site.
    #[error("no candidate sites survived selection")]
    EmptyCandidateSet,
}
