//! R-tree point lookups over parcel and tract outlines.
//!
//! Used to answer "what is under this point" for click and hover handling
//! when no rendering engine is present to do hit-testing.

use geo::{BoundingRect, Contains, MultiPolygon};
use geojson::Geometry;
use rstar::{AABB, RTree, RTreeObject};

/// An outline stored in the R-tree with the index of its feature.
struct OutlineEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for OutlineEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-polygon index over a list of optional geometries.
pub struct OutlineIndex {
    tree: RTree<OutlineEntry>,
}

impl OutlineIndex {
    /// Indexes every polygonal geometry; other geometry kinds and `None`
    /// entries are left out. Indices refer to positions in the input.
    pub fn build<'a>(geometries: impl IntoIterator<Item = Option<&'a Geometry>>) -> Self {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for (index, geometry) in geometries.into_iter().enumerate() {
            let Some(polygon) = geometry.and_then(to_multipolygon) else {
                skipped += 1;
                continue;
            };
            let Some(rect) = polygon.bounding_rect() else {
                skipped += 1;
                continue;
            };
            entries.push(OutlineEntry {
                index,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
                polygon,
            });
        }

        if skipped > 0 {
            log::debug!("{skipped} features have no polygon outline and are not hit-testable");
        }

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indices of every outline containing the point, in ascending order.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Vec<usize> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of indexed outlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn to_multipolygon(geometry: &Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}
