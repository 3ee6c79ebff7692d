//! SVG mission preview.
//!
//! Renders the start point, the waypoints, and the closed flight path
//! using the [`svg`] crate for document construction, XML escaping, and
//! path data formatting.
//!
//! Positions are projected equirectangularly around the mean latitude
//! (longitude scaled by its cosine), which keeps survey-sized areas
//! visually undistorted. North is up. The `viewBox` is in millimetres,
//! with the longer side of the mission spanning [`CONTENT_SIZE_MM`].
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use aerosurvey_engine::Coordinate;
use aerosurvey_engine::geo_math::METERS_PER_DEGREE;
use aerosurvey_engine::types::{Category, Mission};

use crate::ExportError;

/// Size of the longer document side in millimetres.
pub const DOCUMENT_SIZE_MM: f64 = 200.0;
/// Size of the longer mission extent within the document.
pub const CONTENT_SIZE_MM: f64 = 190.0;

const START_RADIUS_MM: f64 = 2.0;
const WAYPOINT_RADIUS_MM: f64 = 1.2;
const PATH_WIDTH_MM: f64 = 0.5;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically by
/// the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`. Typically the mission id.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized mission configuration, emitted inside
    /// `<metadata><aerosurvey:config>` so previews carry the settings
    /// that produced them.
    pub config_json: Option<&'a str>,
}

/// Equirectangular projection into millimetre document space.
#[derive(Debug, Clone, Copy)]
struct Projection {
    min_lng: f64,
    max_lat: f64,
    cos_lat: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    width_mm: f64,
    height_mm: f64,
}

impl Projection {
    /// Fit `points` (non-empty) into the document.
    fn fit(points: &[Coordinate]) -> Self {
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
        let mut lat_sum = 0.0;
        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
            lat_sum += p.latitude;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean_lat = lat_sum / points.len() as f64;
        let cos_lat = mean_lat.to_radians().cos().max(1e-6);

        let width_m = (max_lng - min_lng) * cos_lat * METERS_PER_DEGREE;
        let height_m = (max_lat - min_lat) * METERS_PER_DEGREE;
        let longer = width_m.max(height_m);

        if longer > 0.0 {
            let scale = CONTENT_SIZE_MM / longer;
            let margin = (DOCUMENT_SIZE_MM - CONTENT_SIZE_MM) / 2.0;
            Self {
                min_lng,
                max_lat,
                cos_lat,
                scale,
                offset_x: margin,
                offset_y: margin,
                width_mm: width_m.mul_add(scale, 2.0 * margin),
                height_mm: height_m.mul_add(scale, 2.0 * margin),
            }
        } else {
            // A single position: centre it in a square document.
            Self {
                min_lng,
                max_lat,
                cos_lat,
                scale: 0.0,
                offset_x: DOCUMENT_SIZE_MM / 2.0,
                offset_y: DOCUMENT_SIZE_MM / 2.0,
                width_mm: DOCUMENT_SIZE_MM,
                height_mm: DOCUMENT_SIZE_MM,
            }
        }
    }

    fn apply(&self, p: Coordinate) -> (f64, f64) {
        let x = (p.longitude - self.min_lng) * self.cos_lat * METERS_PER_DEGREE;
        let y = (self.max_lat - p.latitude) * METERS_PER_DEGREE;
        (
            x.mul_add(self.scale, self.offset_x),
            y.mul_add(self.scale, self.offset_y),
        )
    }
}

/// Build the flight path `d` attribute: start, every waypoint, and back
/// to the start (`Z`) when the mission has one.
///
/// Returns an empty string when fewer than two positions are available.
fn build_flight_data(mission: &Mission, projection: &Projection) -> String {
    let closed = mission.start.is_some();
    if mission.waypoints.is_empty() || mission.waypoints.len() + usize::from(closed) < 2 {
        return String::new();
    }

    let mut positions = mission.start.iter().chain(&mission.waypoints);
    let Some(first) = positions.next() else {
        return String::new();
    };
    let mut data = Data::new().move_to(projection.apply(*first));
    for p in positions {
        data = data.line_to(projection.apply(*p));
    }
    if closed {
        data = data.close();
    }
    String::from(Value::from(data))
}

/// Serialize a mission into an SVG preview.
///
/// The document contains, in order: optional `<title>`, `<desc>`, and
/// `<metadata>`; a `flight-path` group with one `<path>`; a `waypoints`
/// group with one `<circle>` per waypoint (with a `data-index`
/// attribute giving the visiting position); and a `start` marker.
///
/// # Errors
///
/// Returns [`ExportError::EmptyMission`] if the mission has neither a
/// start point nor waypoints.
pub fn to_svg(mission: &Mission, metadata: &SvgMetadata<'_>) -> Result<String, ExportError> {
    let positions: Vec<Coordinate> = mission
        .start
        .iter()
        .chain(&mission.waypoints)
        .copied()
        .collect();
    if positions.is_empty() {
        return Err(ExportError::EmptyMission);
    }
    let projection = Projection::fit(&positions);

    let mut doc = Document::new()
        .set("width", format!("{}mm", projection.width_mm))
        .set("height", format!("{}mm", projection.height_mm))
        .set(
            "viewBox",
            format!("0 0 {} {}", projection.width_mm, projection.height_mm),
        )
        .set("preserveAspectRatio", "xMidYMid meet");

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("aerosurvey:config");
        config_el.assign("xmlns:aerosurvey", "urn:aerosurvey:mission:1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    let d = build_flight_data(mission, &projection);
    if !d.is_empty() {
        let path = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", PATH_WIDTH_MM)
            .set("stroke-linejoin", "round");
        doc = doc.add(Group::new().set("id", "flight-path").add(path));
    }

    let mut waypoints = Group::new()
        .set("id", "waypoints")
        .set("fill", Category::GreenVegetation.color());
    for (index, p) in mission.waypoints.iter().enumerate() {
        let (cx, cy) = projection.apply(*p);
        waypoints = waypoints.add(
            Circle::new()
                .set("cx", cx)
                .set("cy", cy)
                .set("r", WAYPOINT_RADIUS_MM)
                .set("data-index", index + 1),
        );
    }
    doc = doc.add(waypoints);

    if let Some(start) = mission.start {
        let (cx, cy) = projection.apply(start);
        doc = doc.add(
            Circle::new()
                .set("id", "start")
                .set("cx", cx)
                .set("cy", cy)
                .set("r", START_RADIUS_MM)
                .set("fill", Category::Water.color()),
        );
    }

    // The svg crate omits the XML declaration, so we prepend it.
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n"))
}
