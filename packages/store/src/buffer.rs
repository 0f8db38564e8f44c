//! Proximity rings around points of interest.
//!
//! Each ring is a polygon whose vertices are geodesic destination points
//! at a fixed radius from the point, computed with `geo`'s haversine
//! measure.

use geo::{Destination, Haversine, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection, Geometry};

use crate::PointOfInterest;

/// Metres per statute mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Number of vertices on each ring.
pub const RING_SEGMENTS: usize = 64;

/// Buffer rings of one radius around every point of interest.
#[derive(Debug, Clone)]
pub struct BufferRings {
    /// Ring radius in miles.
    pub radius_miles: f64,
    /// One polygon feature per point of interest.
    pub collection: FeatureCollection,
}

impl BufferRings {
    /// Builds rings of `radius_miles` around each point.
    #[must_use]
    pub fn around(points: &[PointOfInterest], radius_miles: f64) -> Self {
        let features = points
            .iter()
            .map(|poi| {
                let polygon = ring(poi.coordinate, radius_miles * METERS_PER_MILE);
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::from(&polygon))),
                    id: None,
                    properties: Some(poi.properties()),
                    foreign_members: None,
                }
            })
            .collect();

        Self {
            radius_miles,
            collection: FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
        }
    }
}

/// Closed polygon approximating a circle of `radius_m` metres.
#[allow(clippy::cast_precision_loss)]
fn ring(center: [f64; 2], radius_m: f64) -> Polygon<f64> {
    let origin = Point::new(center[0], center[1]);
    let mut vertices: Vec<geo::Coord<f64>> = (0..RING_SEGMENTS)
        .map(|i| {
            let bearing = 360.0 * i as f64 / RING_SEGMENTS as f64;
            Haversine.destination(origin, bearing, radius_m).into()
        })
        .collect();
    if let Some(first) = vertices.first().copied() {
        vertices.push(first);
    }
    Polygon::new(LineString::new(vertices), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinates as _;
    use parcel_map_parcel_models::PointOfInterestAttributes;

    fn gym(lng: f64, lat: f64) -> PointOfInterest {
        PointOfInterest {
            attributes: PointOfInterestAttributes {
                name: Some("Test Gym".to_string()),
                ..PointOfInterestAttributes::default()
            },
            coordinate: [lng, lat],
        }
    }

    #[test]
    fn one_ring_per_point() {
        let rings = BufferRings::around(&[gym(-122.2, 48.0), gym(-122.0, 47.9)], 3.0);
        assert_eq!(rings.collection.features.len(), 2);
        assert!((rings.radius_miles - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ring_extent_matches_radius() {
        let rings = BufferRings::around(&[gym(-122.2, 48.0)], 5.0);
        let geometry = rings.collection.features[0].geometry.as_ref().unwrap();
        let bounds = geometry.bounds().unwrap();
        // 5 miles is ~0.0724 degrees of latitude.
        let lat_span = bounds.north - bounds.south;
        assert!(
            (lat_span - 2.0 * 0.0724).abs() < 0.002,
            "unexpected latitude span {lat_span}"
        );
        assert!(bounds.contains(-122.2, 48.0));
    }

    #[test]
    fn ring_is_closed() {
        let polygon = ring([0.0, 0.0], 1_000.0);
        let coords: Vec<_> = polygon.exterior().coords().copied().collect();
        assert_eq!(coords.len(), RING_SEGMENTS + 1);
        assert_eq!(coords.first(), coords.last());
    }
}
