#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offline preprocessing for the parcel map.
//!
//! Two tools produce the documents the viewer loads:
//!
//! - [`strip`] streams the raw county parcel export, drops parcels whose
//!   use code is not of interest, keeps a handful of fields, derives the
//!   zoning category, and rounds coordinates.
//! - [`income`] fetches census tract boundaries from `TIGERweb` and median
//!   household income from the Census Data API and joins them into the
//!   income overlay.

pub mod income;
pub mod strip;

use serde_json::Value;
use thiserror::Error;

/// Errors from the preprocessing tools.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document was not valid JSON or had an unexpected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A census service answered with something unusable.
    #[error("Census error: {message}")]
    Census {
        /// Description of what went wrong.
        message: String,
    },
}

/// Rounds every number in a `GeoJSON` `coordinates` tree to `decimals`
/// places, in place.
pub fn round_coordinates(coordinates: &mut Value, decimals: i32) {
    let scale = 10f64.powi(decimals);
    match coordinates {
        Value::Array(items) => {
            for item in items {
                round_coordinates(item, decimals);
            }
        }
        Value::Number(n) => {
            if let Some(rounded) = n
                .as_f64()
                .map(|v| (v * scale).round() / scale)
                .and_then(serde_json::Number::from_f64)
            {
                *n = rounded;
            }
        }
        _ => {}
    }
}

/// Rounds the coordinates of a `GeoJSON` geometry object, if it has any.
pub fn round_geometry(geometry: &mut Value, decimals: i32) {
    if let Some(coordinates) = geometry.get_mut("coordinates") {
        round_coordinates(coordinates, decimals);
    }
}

/// File size in whole megabytes (10^6 bytes), as the tools report it.
#[must_use]
pub fn megabytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mb = bytes as f64 / 1e6;
    format!("{mb:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_nested_coordinates() {
        let mut geometry = json!({
            "type": "Polygon",
            "coordinates": [[[-122.123_456_789, 48.000_000_4], [-122.1, 48.987_654_321]]]
        });
        round_geometry(&mut geometry, 6);
        assert_eq!(
            geometry["coordinates"],
            json!([[[-122.123_457, 48.0], [-122.1, 48.987_654]]])
        );
    }

    #[test]
    fn geometry_without_coordinates_is_untouched() {
        let mut geometry = json!({ "type": "GeometryCollection", "geometries": [] });
        let before = geometry.clone();
        round_geometry(&mut geometry, 5);
        assert_eq!(geometry, before);
    }

    #[test]
    fn megabytes_rounds_to_whole_numbers() {
        assert_eq!(megabytes(163_400_000), "163");
        assert_eq!(megabytes(0), "0");
    }
}
