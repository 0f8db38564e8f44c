//! The loaded collections for one session.

use std::collections::BTreeSet;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use parcel_map_parcel_models::{
    IncomeTractAttributes, ParcelAttributes, ParcelId, PointOfInterestAttributes,
};
use serde::Serialize;

use crate::StoreError;
use crate::buffer::BufferRings;

/// One land parcel.
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Sequential identifier assigned at load.
    pub id: ParcelId,
    /// Normalized attributes.
    pub attributes: ParcelAttributes,
    /// Polygon or multi-polygon outline.
    pub geometry: Option<Geometry>,
}

/// A named point location.
#[derive(Debug, Clone)]
pub struct PointOfInterest {
    /// Name, category, contact details.
    pub attributes: PointOfInterestAttributes,
    /// `[lng, lat]`.
    pub coordinate: [f64; 2],
}

impl PointOfInterest {
    /// Attributes as a `GeoJSON` properties object.
    #[must_use]
    pub fn properties(&self) -> JsonObject {
        to_properties(&self.attributes)
    }
}

/// A census tract in the income overlay.
#[derive(Debug, Clone)]
pub struct IncomeTract {
    /// GEOID, name, median income, bracket.
    pub attributes: IncomeTractAttributes,
    /// Tract outline.
    pub geometry: Option<Geometry>,
}

/// All feature collections for one session.
///
/// Parcel identifiers are assigned once, in source order, when the store
/// is built. Attributes are never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    parcels: Vec<Parcel>,
    points_of_interest: Vec<PointOfInterest>,
    buffer_rings: Vec<BufferRings>,
    income_tracts: Option<Vec<IncomeTract>>,
}

impl FeatureStore {
    /// Builds the store from parsed collections.
    ///
    /// Point-of-interest features without a point geometry are skipped.
    /// One set of [`BufferRings`] is derived per entry in
    /// `buffer_radii_miles`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] if a feature's properties cannot be
    /// read as attributes.
    pub fn from_collections(
        parcels: FeatureCollection,
        points_of_interest: FeatureCollection,
        income_tracts: Option<FeatureCollection>,
        buffer_radii_miles: &[f64],
    ) -> Result<Self, StoreError> {
        let parcels = parcels
            .features
            .into_iter()
            .zip(0u64..)
            .map(|(feature, index)| {
                Ok(Parcel {
                    id: ParcelId(index),
                    attributes: from_properties(feature.properties)?,
                    geometry: feature.geometry,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut skipped = 0usize;
        let mut pois = Vec::with_capacity(points_of_interest.features.len());
        for feature in points_of_interest.features {
            let Some(coordinate) = point_coordinate(feature.geometry.as_ref()) else {
                skipped += 1;
                continue;
            };
            pois.push(PointOfInterest {
                attributes: from_properties(feature.properties)?,
                coordinate,
            });
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} points of interest without a point geometry");
        }

        let income_tracts = income_tracts
            .map(|collection| {
                collection
                    .features
                    .into_iter()
                    .map(|feature| {
                        Ok(IncomeTract {
                            attributes: from_properties(feature.properties)?,
                            geometry: feature.geometry,
                        })
                    })
                    .collect::<Result<Vec<_>, StoreError>>()
            })
            .transpose()?;

        let buffer_rings = buffer_radii_miles
            .iter()
            .map(|radius| BufferRings::around(&pois, *radius))
            .collect();

        Ok(Self {
            parcels,
            points_of_interest: pois,
            buffer_rings,
            income_tracts,
        })
    }

    /// All parcels in source order.
    #[must_use]
    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    /// Looks up a parcel by identifier.
    #[must_use]
    pub fn parcel(&self, id: ParcelId) -> Option<&Parcel> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.parcels.get(index))
    }

    /// All points of interest in source order.
    #[must_use]
    pub fn points_of_interest(&self) -> &[PointOfInterest] {
        &self.points_of_interest
    }

    /// Buffer rings, one entry per configured radius.
    #[must_use]
    pub fn buffer_rings(&self) -> &[BufferRings] {
        &self.buffer_rings
    }

    /// Buffer rings of a given radius.
    #[must_use]
    pub fn buffer_rings_for(&self, radius_miles: f64) -> Option<&BufferRings> {
        self.buffer_rings
            .iter()
            .find(|rings| (rings.radius_miles - radius_miles).abs() < f64::EPSILON)
    }

    /// Income tracts, if the optional income stage loaded.
    #[must_use]
    pub fn income_tracts(&self) -> Option<&[IncomeTract]> {
        self.income_tracts.as_deref()
    }

    /// Sorted distinct non-empty city names.
    #[must_use]
    pub fn cities(&self) -> Vec<String> {
        self.parcels
            .iter()
            .filter_map(|p| p.attributes.city.as_deref())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Parcels as a `GeoJSON` collection for the renderer.
    ///
    /// Feature ids are the parcel identifiers and properties are the
    /// normalized attributes, so declarative filters evaluated by the
    /// renderer see exactly the values the in-process filter sees.
    #[must_use]
    pub fn parcels_geojson(&self) -> FeatureCollection {
        collection(self.parcels.iter().map(|parcel| Feature {
            bbox: None,
            geometry: parcel.geometry.clone(),
            id: Some(Id::Number(parcel.id.0.into())),
            properties: Some(to_properties(&parcel.attributes)),
            foreign_members: None,
        }))
    }

    /// Points of interest as a `GeoJSON` collection for the renderer.
    #[must_use]
    pub fn points_of_interest_geojson(&self) -> FeatureCollection {
        collection(self.points_of_interest.iter().map(|poi| Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(
                poi.coordinate.to_vec(),
            ))),
            id: None,
            properties: Some(poi.properties()),
            foreign_members: None,
        }))
    }

    /// Income tracts as a `GeoJSON` collection for the renderer.
    #[must_use]
    pub fn income_geojson(&self) -> Option<FeatureCollection> {
        self.income_tracts.as_ref().map(|tracts| {
            collection(tracts.iter().map(|tract| Feature {
                bbox: None,
                geometry: tract.geometry.clone(),
                id: None,
                properties: Some(to_properties(&tract.attributes)),
                foreign_members: None,
            }))
        })
    }
}

fn collection(features: impl Iterator<Item = Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.collect(),
        foreign_members: None,
    }
}

fn from_properties<T: serde::de::DeserializeOwned>(
    properties: Option<JsonObject>,
) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::Object(
        properties.unwrap_or_default(),
    ))?)
}

fn to_properties<T: Serialize>(attributes: &T) -> JsonObject {
    match serde_json::to_value(attributes) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

fn point_coordinate(geometry: Option<&Geometry>) -> Option<[f64; 2]> {
    match &geometry?.value {
        geojson::Value::Point(position) => match position.as_slice() {
            [lng, lat, ..] => Some([*lng, *lat]),
            _ => None,
        },
        _ => None,
    }
}
