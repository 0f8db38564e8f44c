//! Bounding regions over `GeoJSON` coordinates.
//!
//! Geometries nest their positions to different depths (a point is one
//! position, a polygon is rings of positions, a multi-polygon is polygons
//! of rings). [`Coordinates`] descends through any depth of nesting and
//! stops at the first level whose elements are scalars.

use geojson::Value;
use serde::{Deserialize, Serialize};

/// Axis-aligned longitude/latitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl Bounds {
    /// A zero-area rectangle at one position.
    #[must_use]
    pub const fn from_point(lng: f64, lat: f64) -> Self {
        Self {
            west: lng,
            south: lat,
            east: lng,
            north: lat,
        }
    }

    /// Grows the rectangle to include a position.
    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.west = self.west.min(lng);
        self.south = self.south.min(lat);
        self.east = self.east.max(lng);
        self.north = self.north.max(lat);
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        self.extend(other.west, other.south);
        self.extend(other.east, other.north);
        self
    }

    /// Whether a position lies inside or on the edge.
    #[must_use]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        (self.west..=self.east).contains(&lng) && (self.south..=self.north).contains(&lat)
    }

    /// Centre position as `[lng, lat]`.
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        [
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        ]
    }
}

/// Anything that is, or nests, `[lng, lat, ...]` positions.
pub trait Coordinates {
    /// Extends `bounds` with every position reachable from `self`.
    fn extend_bounds(&self, bounds: &mut Option<Bounds>);

    /// Bounding rectangle of every position, or `None` if there are none.
    fn bounds(&self) -> Option<Bounds> {
        let mut bounds = None;
        self.extend_bounds(&mut bounds);
        bounds
    }
}

/// A single position: elements are scalars, so descent stops here.
impl Coordinates for Vec<f64> {
    fn extend_bounds(&self, bounds: &mut Option<Bounds>) {
        let [lng, lat, ..] = self.as_slice() else {
            return;
        };
        if !lng.is_finite() || !lat.is_finite() {
            return;
        }
        match bounds {
            Some(b) => b.extend(*lng, *lat),
            None => *bounds = Some(Bounds::from_point(*lng, *lat)),
        }
    }
}

/// One more level of nesting.
impl<T: Coordinates> Coordinates for Vec<T> {
    fn extend_bounds(&self, bounds: &mut Option<Bounds>) {
        for inner in self {
            inner.extend_bounds(bounds);
        }
    }
}

impl Coordinates for Value {
    fn extend_bounds(&self, bounds: &mut Option<Bounds>) {
        match self {
            Self::Point(position) => position.extend_bounds(bounds),
            Self::MultiPoint(positions) | Self::LineString(positions) => {
                positions.extend_bounds(bounds);
            }
            Self::MultiLineString(lines) | Self::Polygon(lines) => lines.extend_bounds(bounds),
            Self::MultiPolygon(polygons) => polygons.extend_bounds(bounds),
            Self::GeometryCollection(geometries) => {
                for geometry in geometries {
                    geometry.value.extend_bounds(bounds);
                }
            }
        }
    }
}

impl Coordinates for geojson::Geometry {
    fn extend_bounds(&self, bounds: &mut Option<Bounds>) {
        self.value.extend_bounds(bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(west: f64, south: f64, size: f64) -> Vec<Vec<Vec<f64>>> {
        vec![vec![
            vec![west, south],
            vec![west + size, south],
            vec![west + size, south + size],
            vec![west, south + size],
            vec![west, south],
        ]]
    }

    #[test]
    fn polygon_bounds() {
        let bounds = Value::Polygon(square(-122.3, 47.9, 0.1)).bounds().unwrap();
        assert!((bounds.west - -122.3).abs() < 1e-9);
        assert!((bounds.south - 47.9).abs() < 1e-9);
        assert!((bounds.east - -122.2).abs() < 1e-9);
        assert!((bounds.north - 48.0).abs() < 1e-9);
    }

    #[test]
    fn multipolygon_descends_one_level_deeper() {
        let value = Value::MultiPolygon(vec![square(0.0, 0.0, 1.0), square(5.0, -3.0, 1.0)]);
        let bounds = value.bounds().unwrap();
        assert_eq!(
            bounds,
            Bounds {
                west: 0.0,
                south: -3.0,
                east: 6.0,
                north: 1.0,
            }
        );
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        assert!(Value::MultiPolygon(vec![]).bounds().is_none());
        assert!(Value::Point(vec![]).bounds().is_none());
    }

    #[test]
    fn altitude_is_ignored() {
        let bounds = Value::Point(vec![1.0, 2.0, 300.0]).bounds().unwrap();
        assert_eq!(bounds, Bounds::from_point(1.0, 2.0));
    }

    #[test]
    fn union_covers_both() {
        let a = Bounds::from_point(0.0, 0.0);
        let b = Bounds::from_point(2.0, -1.0);
        let u = a.union(b);
        assert!(u.contains(1.0, -0.5));
        assert_eq!(u.center(), [1.0, -0.5]);
    }
}
