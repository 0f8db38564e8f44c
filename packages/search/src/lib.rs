#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Free-text search over the feature store.
//!
//! A query is trimmed and upper-cased, then matched as a substring in two
//! passes that short-circuit:
//!
//! 1. Point-of-interest names. The first match in source order becomes the
//!    camera target.
//! 2. Parcel addresses, only when no point of interest matched. Every
//!    matching parcel is flagged as searched and the camera frames the
//!    union of their outlines.

use parcel_map_parcel_models::ParcelId;
use parcel_map_store::FeatureStore;
use parcel_map_store::geometry::{Bounds, Coordinates};
use strum_macros::AsRefStr;

/// A normalized, non-empty search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Trims and upper-cases `raw`. Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    /// The normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `field`, case-folded, contains this query.
    #[must_use]
    pub fn matches(&self, field: Option<&str>) -> bool {
        field.is_some_and(|value| value.to_uppercase().contains(&self.0))
    }
}

/// The point of interest a search landed on.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterestMatch {
    /// Position of the first match in the store.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// Category shown under the name.
    pub category: Option<String>,
    /// `[lng, lat]` to centre the camera on.
    pub coordinate: [f64; 2],
    /// How many points of interest matched in total.
    pub match_count: usize,
}

/// The parcels a search matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelMatches {
    /// Matching parcel identifiers in source order. Never empty.
    pub ids: Vec<ParcelId>,
    /// Union bounding region of the matched outlines, if any had geometry.
    pub bounds: Option<Bounds>,
    /// Address of the first match.
    pub first_address: String,
}

impl ParcelMatches {
    /// Whether `id` is one of the matches.
    #[must_use]
    pub fn contains(&self, id: ParcelId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
}

/// Outcome of one submitted query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    /// Nothing matched.
    NoMatch,
    /// A point-of-interest name matched; parcels were not searched.
    PointOfInterest(PointOfInterestMatch),
    /// One or more parcel addresses matched.
    Parcels(ParcelMatches),
}

/// How the status line is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum StatusStyle {
    /// Ordinary outcome.
    #[strum(serialize = "")]
    Normal,
    /// Nothing was found.
    #[strum(serialize = "error")]
    Error,
}

/// Text for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// What to display.
    pub text: String,
    /// How to display it.
    pub style: StatusStyle,
}

impl SearchResult {
    /// Status line describing this outcome.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::NoMatch => Status {
                text: "No parcels or gyms found".to_string(),
                style: StatusStyle::Error,
            },
            Self::PointOfInterest(poi) => Status {
                text: if poi.match_count == 1 {
                    format!("Gym: {}", poi.name)
                } else {
                    format!("{} gyms match (showing first)", poi.match_count)
                },
                style: StatusStyle::Normal,
            },
            Self::Parcels(parcels) => Status {
                text: if parcels.ids.len() == 1 {
                    format!("Found: {}", parcels.first_address)
                } else {
                    format!("{} parcels match", parcels.ids.len())
                },
                style: StatusStyle::Normal,
            },
        }
    }

    /// The `searched` flag for every parcel in `store`.
    ///
    /// Flags are recomputed from scratch: only parcels matched by this
    /// result are `true`.
    pub fn searched_flags<'a>(
        &'a self,
        store: &'a FeatureStore,
    ) -> impl Iterator<Item = (ParcelId, bool)> + 'a {
        store.parcels().iter().map(move |parcel| {
            let searched = match self {
                Self::Parcels(matches) => matches.contains(parcel.id),
                Self::NoMatch | Self::PointOfInterest(_) => false,
            };
            (parcel.id, searched)
        })
    }
}

/// Runs `query` against `store`.
#[must_use]
pub fn search(store: &FeatureStore, query: &Query) -> SearchResult {
    let mut poi_matches = store
        .points_of_interest()
        .iter()
        .enumerate()
        .filter(|(_, poi)| query.matches(poi.attributes.name.as_deref()));

    if let Some((index, first)) = poi_matches.next() {
        let match_count = 1 + poi_matches.count();
        log::debug!(
            "Query {:?} matched {match_count} points of interest",
            query.as_str()
        );
        return SearchResult::PointOfInterest(PointOfInterestMatch {
            index,
            name: first.attributes.name.clone().unwrap_or_default(),
            category: first.attributes.category.clone(),
            coordinate: first.coordinate,
            match_count,
        });
    }

    let mut ids = Vec::new();
    let mut bounds: Option<Bounds> = None;
    let mut first_address = None;

    for parcel in store.parcels() {
        let address = parcel.attributes.address.as_deref();
        if !query.matches(address) {
            continue;
        }
        if first_address.is_none() {
            first_address = address.map(str::to_string);
        }
        if let Some(geometry) = &parcel.geometry {
            geometry.extend_bounds(&mut bounds);
        }
        ids.push(parcel.id);
    }

    log::debug!("Query {:?} matched {} parcels", query.as_str(), ids.len());

    if ids.is_empty() {
        return SearchResult::NoMatch;
    }

    SearchResult::Parcels(ParcelMatches {
        ids,
        bounds,
        first_address: first_address.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_map_store::source::parse_feature_collection;
    use serde_json::json;

    fn square(west: f64, south: f64) -> serde_json::Value {
        json!({"type": "Polygon", "coordinates": [[
            [west, south], [west + 0.01, south], [west + 0.01, south + 0.01],
            [west, south + 0.01], [west, south]
        ]]})
    }

    fn store() -> FeatureStore {
        let parcels = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": square(-122.30, 47.90),
             "properties": {"SITUSLINE1": "100 MAIN ST", "SITUSCITY": "EVERETT"}},
            {"type": "Feature", "geometry": square(-122.10, 48.10),
             "properties": {"SITUSLINE1": "200 Main St", "SITUSCITY": "MONROE"}},
            {"type": "Feature",
             "geometry": {"type": "MultiPolygon", "coordinates": [
                 [[[-122.5, 47.5], [-122.49, 47.5], [-122.49, 47.51], [-122.5, 47.5]]]
             ]},
             "properties": {"SITUSLINE1": "9 IRON WAY"}},
            {"type": "Feature", "geometry": null, "properties": {"SITUSLINE1": null}}
        ]});
        let gyms = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-122.2, 48.0]},
             "properties": {"name": "Iron Works Gym", "category": "Gym"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-122.3, 48.1]},
             "properties": {"name": "Planet Iron", "category": "Fitness"}}
        ]});
        FeatureStore::from_collections(
            parse_feature_collection(parcels.to_string().as_bytes()).unwrap(),
            parse_feature_collection(gyms.to_string().as_bytes()).unwrap(),
            None,
            &[],
        )
        .unwrap()
    }

    #[test]
    fn blank_query_is_rejected() {
        assert_eq!(Query::parse(""), None);
        assert_eq!(Query::parse("   \t"), None);
        assert_eq!(Query::parse("  main st ").unwrap().as_str(), "MAIN ST");
    }

    #[test]
    fn point_of_interest_wins_over_address() {
        let store = store();
        let result = search(&store, &Query::parse("iron").unwrap());
        let SearchResult::PointOfInterest(poi) = &result else {
            panic!("expected a point of interest match, got {result:?}");
        };
        assert_eq!(poi.index, 0);
        assert_eq!(poi.name, "Iron Works Gym");
        assert_eq!(poi.category.as_deref(), Some("Gym"));
        assert_eq!(poi.coordinate, [-122.2, 48.0]);
        assert_eq!(poi.match_count, 2);
        assert_eq!(result.status().text, "2 gyms match (showing first)");
        assert!(result.searched_flags(&store).all(|(_, searched)| !searched));
    }

    #[test]
    fn single_point_of_interest_status() {
        let store = store();
        let result = search(&store, &Query::parse("planet").unwrap());
        assert_eq!(result.status().text, "Gym: Planet Iron");
        assert_eq!(result.status().style, StatusStyle::Normal);
    }

    #[test]
    fn two_address_matches_cover_both_outlines() {
        let store = store();
        let result = search(&store, &Query::parse("main st").unwrap());
        let SearchResult::Parcels(matches) = &result else {
            panic!("expected parcel matches, got {result:?}");
        };
        assert_eq!(matches.ids, vec![ParcelId(0), ParcelId(1)]);
        let bounds = matches.bounds.unwrap();
        assert!((bounds.west - -122.30).abs() < 1e-9);
        assert!((bounds.south - 47.90).abs() < 1e-9);
        assert!((bounds.east - -122.09).abs() < 1e-9);
        assert!((bounds.north - 48.11).abs() < 1e-9);
        assert_eq!(result.status().text, "2 parcels match");

        let flags: Vec<_> = result.searched_flags(&store).collect();
        assert_eq!(
            flags,
            vec![
                (ParcelId(0), true),
                (ParcelId(1), true),
                (ParcelId(2), false),
                (ParcelId(3), false),
            ]
        );
    }

    #[test]
    fn single_address_match_reports_address() {
        let store = store();
        let result = search(&store, &Query::parse("way").unwrap());
        assert_eq!(result.status().text, "Found: 9 IRON WAY");
        let SearchResult::Parcels(matches) = &result else {
            panic!("expected parcel matches, got {result:?}");
        };
        let bounds = matches.bounds.unwrap();
        assert!((bounds.west - -122.5).abs() < 1e-9);
        assert!((bounds.north - 47.51).abs() < 1e-9);
    }

    #[test]
    fn no_match_is_an_error_status_and_clears_flags() {
        let store = store();
        let result = search(&store, &Query::parse("nowhere").unwrap());
        assert_eq!(result, SearchResult::NoMatch);
        let status = result.status();
        assert_eq!(status.text, "No parcels or gyms found");
        assert_eq!(status.style, StatusStyle::Error);
        assert_eq!(status.style.as_ref(), "error");
        assert!(result.searched_flags(&store).all(|(_, searched)| !searched));
    }
}
