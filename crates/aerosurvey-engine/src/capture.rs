//! Capture file names.
//!
//! Drone captures are stored as `drone_<timestamp>_<lat>_<lng>_.jpg` and
//! their segmentation masks as `mask_<timestamp>_<lat>_<lng>_.png`. The
//! capture position is recovered from the name when a site result is
//! built, so no image metadata has to be read twice.

use std::fmt;

use crate::types::{Coordinate, Distribution, EngineError, SiteResult};

const IMAGE_PREFIX: &str = "drone_";
const IMAGE_SUFFIX: &str = "_.jpg";
const MASK_PREFIX: &str = "mask_";
const MASK_SUFFIX: &str = "_.png";

/// Timestamp and position encoded in a capture file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureName {
    /// Capture time in Unix seconds.
    pub timestamp: f64,
    /// Capture position.
    pub coordinate: Coordinate,
}

impl CaptureName {
    /// Parse an image or mask file name.
    ///
    /// Returns `None` when the name does not follow either pattern or the
    /// encoded position is out of range.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let body = name
            .strip_prefix(IMAGE_PREFIX)
            .and_then(|rest| rest.strip_suffix(IMAGE_SUFFIX))
            .or_else(|| {
                name.strip_prefix(MASK_PREFIX)
                    .and_then(|rest| rest.strip_suffix(MASK_SUFFIX))
            })?;

        let mut fields = body.split('_');
        let timestamp = fields.next()?.parse::<f64>().ok()?;
        let latitude = fields.next()?.parse::<f64>().ok()?;
        let longitude = fields.next()?.parse::<f64>().ok()?;
        if fields.next().is_some() || !timestamp.is_finite() {
            return None;
        }
        let coordinate = Coordinate::new(latitude, longitude).ok()?;
        Some(Self {
            timestamp,
            coordinate,
        })
    }

    /// Image file name for this capture.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{IMAGE_PREFIX}{self}{IMAGE_SUFFIX}")
    }

    /// Mask file name for this capture.
    #[must_use]
    pub fn mask_file_name(&self) -> String {
        format!("{MASK_PREFIX}{self}{MASK_SUFFIX}")
    }
}

impl fmt::Display for CaptureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.timestamp, self.coordinate.latitude, self.coordinate.longitude
        )
    }
}

impl SiteResult {
    /// Build a result for a stored capture, taking its position from the
    /// image file name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `image` is not a capture
    /// file name.
    pub fn from_capture(
        image: impl Into<String>,
        mask: impl Into<String>,
        distribution: Distribution,
    ) -> Result<Self, EngineError> {
        let image = image.into();
        let capture = CaptureName::parse(&image).ok_or_else(|| {
            EngineError::InvalidInput(format!("{image:?} is not a capture file name"))
        })?;
        Ok(Self {
            image,
            mask: mask.into(),
            coordinate: capture.coordinate,
            distribution,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn parses_image_name() {
        let name = CaptureName::parse("drone_1718000000.25_25.0005_-100.0005_.jpg").unwrap();
        assert!((name.timestamp - 1_718_000_000.25).abs() < 1e-6);
        assert_eq!(name.coordinate, Coordinate::new_unchecked(25.0005, -100.0005));
    }

    #[test]
    fn parses_mask_name() {
        let name = CaptureName::parse("mask_1718000000.25_25.0005_-100.0005_.png").unwrap();
        assert_eq!(name.coordinate, Coordinate::new_unchecked(25.0005, -100.0005));
    }

    #[test]
    fn formats_both_names() {
        let name = CaptureName {
            timestamp: 1_718_000_000.5,
            coordinate: Coordinate::new_unchecked(25.001, -100.25),
        };
        assert_eq!(name.file_name(), "drone_1718000000.5_25.001_-100.25_.jpg");
        assert_eq!(name.mask_file_name(), "mask_1718000000.5_25.001_-100.25_.png");
        assert_eq!(CaptureName::parse(&name.file_name()), Some(name));
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "",
            "drone_.jpg",
            "drone_1_2_.jpg",
            "drone_1_2_3_4_.jpg",
            "drone_x_25.0_-100.0_.jpg",
            "drone_1_95.0_-100.0_.jpg",
            "photo_1_25.0_-100.0_.jpg",
            "drone_1_25.0_-100.0_.png",
        ] {
            assert!(CaptureName::parse(bad).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn site_result_from_capture() {
        let distribution = Distribution::new().with(Category::DryVegetation, 42.0);
        let result = SiteResult::from_capture(
            "drone_1718000000.25_25.0005_-100.0005_.jpg",
            "mask_1718000000.25_25.0005_-100.0005_.png",
            distribution,
        )
        .unwrap();
        assert_eq!(result.coordinate, Coordinate::new_unchecked(25.0005, -100.0005));
        assert!((result.priority() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn site_result_from_unknown_name_fails() {
        let result = SiteResult::from_capture("IMG_0001.jpg", "", Distribution::new());
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
