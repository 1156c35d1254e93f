use serde::Serialize;

use crate::task::Task;

pub const DEFAULT_CENTER: Coordinate = Coordinate {
    lat: 37.7749,
    lng: -122.4194,
};
pub const DEFAULT_ZOOM: u8 = 3;
pub const NO_DUE_DATE_LABEL: &str = "No due date";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: String,
    pub position: Coordinate,
    pub title: String,
    /// The raw due date, or "No due date".
    pub subtitle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
}

/// Markers for every task whose location parses; others are left out.
pub fn map_markers(tasks: &[Task]) -> Vec<MapMarker> {
    tasks
        .iter()
        .filter_map(|task| {
            let position = parse_location(task.location()?)?;
            Some(MapMarker {
                id: task.id.clone(),
                position,
                title: task.description.clone(),
                subtitle: task.due_date().unwrap_or(NO_DUE_DATE_LABEL).to_string(),
            })
        })
        .collect()
}

pub fn map_view(tasks: &[Task], center: Coordinate, zoom: u8) -> MapView {
    MapView {
        center,
        zoom,
        markers: map_markers(tasks),
    }
}

/// Reads `"<lat>,<lng>"`. Parts past the second are ignored.
pub fn parse_location(raw: &str) -> Option<Coordinate> {
    let mut parts = raw.split(',');
    let lat = parse_coordinate(parts.next()?)?;
    let lng = parse_coordinate(parts.next()?)?;
    Some(Coordinate { lat, lng })
}

/// Lenient numeric coercion: surrounding whitespace is ignored, an empty
/// part is zero, `0x`/`0o`/`0b` integer literals are accepted. Non-finite
/// results are rejected.
fn parse_coordinate(part: &str) -> Option<f64> {
    let trimmed = part.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            // from_str_radix tolerates a leading sign; radix literals do not.
            if digits.starts_with(['+', '-']) {
                return None;
            }
            return u64::from_str_radix(digits, radix).ok().map(|v| v as f64);
        }
    }

    let value: f64 = trimmed.parse().ok()?;
    value.is_finite().then_some(value)
}
