#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel zoning taxonomy and feature attribute types.
//!
//! This crate defines the zoning categories derived from county use codes
//! and the attribute records carried by the three feature collections the
//! viewer works with: parcels, points of interest ("gyms"), and census
//! income tracts. Field names match the `GeoJSON` property keys produced by
//! the preprocessing tools so the same types serialize straight back into
//! the documents handed to the renderer.

pub mod properties;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Land-use classification derived from the first digit of a county use
/// code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ZoneCategory {
    /// Use codes `1xx`.
    Residential,
    /// Use codes `2xx`.
    Commercial,
    /// Use codes `3xx`.
    Industrial,
    /// Use codes `4xx`. Dropped during preprocessing.
    Transportation,
    /// Use codes `5xx`.
    Trade,
    /// Use codes `6xx`.
    Services,
    /// Use codes `7xx`.
    #[serde(rename = "Cultural/Recreation")]
    #[strum(serialize = "Cultural/Recreation")]
    CulturalRecreation,
    /// Use codes `8xx`. Dropped during preprocessing.
    #[serde(rename = "Resource/Agriculture")]
    #[strum(serialize = "Resource/Agriculture")]
    ResourceAgriculture,
    /// Use codes `9xx`. Dropped during preprocessing.
    Government,
    /// Use codes `0xx`.
    Undeveloped,
    /// Use codes that do not start with a digit.
    Other,
}

/// Fill colour for parcels whose zone has no palette entry.
pub const FALLBACK_ZONE_COLOR: &str = "#95a5a6";

impl ZoneCategory {
    /// The categories offered as filter checkboxes, in display order.
    ///
    /// Selecting all of these means the zoning rule does not narrow the
    /// parcel set.
    pub const FILTERABLE: &'static [Self] = &[
        Self::Residential,
        Self::Commercial,
        Self::Industrial,
        Self::Trade,
        Self::Services,
        Self::CulturalRecreation,
        Self::Undeveloped,
    ];

    /// Derives the category from a raw use code.
    ///
    /// Returns `None` for blank codes.
    #[must_use]
    pub fn from_use_code(use_code: &str) -> Option<Self> {
        let first = use_code.trim().chars().next()?;
        Some(match first {
            '0' => Self::Undeveloped,
            '1' => Self::Residential,
            '2' => Self::Commercial,
            '3' => Self::Industrial,
            '4' => Self::Transportation,
            '5' => Self::Trade,
            '6' => Self::Services,
            '7' => Self::CulturalRecreation,
            '8' => Self::ResourceAgriculture,
            '9' => Self::Government,
            _ => Self::Other,
        })
    }

    /// Map fill colour for this category, if it has one.
    #[must_use]
    pub const fn color(self) -> Option<&'static str> {
        match self {
            Self::Residential => Some("#f4c542"),
            Self::Commercial => Some("#e74c3c"),
            Self::Industrial => Some("#8e44ad"),
            Self::Trade => Some("#e67e22"),
            Self::Services => Some("#2ecc71"),
            Self::CulturalRecreation => Some("#1abc9c"),
            Self::Undeveloped => Some("#bdc3c7"),
            Self::Transportation | Self::ResourceAgriculture | Self::Government | Self::Other => {
                None
            }
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Residential,
            Self::Commercial,
            Self::Industrial,
            Self::Transportation,
            Self::Trade,
            Self::Services,
            Self::CulturalRecreation,
            Self::ResourceAgriculture,
            Self::Government,
            Self::Undeveloped,
            Self::Other,
        ]
    }
}

/// Stable per-load parcel identifier.
///
/// Assigned sequentially from zero in source order and used as the join
/// key for renderer feature state (hover, search highlight).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ParcelId(pub u64);

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes of one land parcel.
///
/// Numeric fields are parsed leniently: numbers and numeric strings are
/// accepted, anything else (including negative or non-finite values)
/// becomes `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelAttributes {
    /// County parcel number.
    #[serde(rename = "PARCEL_ID", default, deserialize_with = "lenient_string")]
    pub parcel_number: Option<String>,
    /// Derived zoning category.
    #[serde(rename = "ZONE_CAT", default, deserialize_with = "lenient_zone")]
    pub zone: Option<ZoneCategory>,
    /// Raw county use code.
    #[serde(rename = "USECODE", default, deserialize_with = "lenient_string")]
    pub use_code: Option<String>,
    /// Area in acres.
    #[serde(rename = "GIS_ACRES", default, deserialize_with = "lenient_f64")]
    pub acres: Option<f64>,
    /// Area in square feet.
    #[serde(rename = "GIS_SQ_FT", default, deserialize_with = "lenient_f64")]
    pub square_feet: Option<f64>,
    /// Situs street address line.
    #[serde(rename = "SITUSLINE1", default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    /// Situs city.
    #[serde(rename = "SITUSCITY", default, deserialize_with = "lenient_string")]
    pub city: Option<String>,
    /// Situs ZIP code.
    #[serde(rename = "SITUSZIP", default, deserialize_with = "lenient_string")]
    pub zip: Option<String>,
    /// Total assessed market value in whole dollars.
    #[serde(rename = "MKTTL", default, deserialize_with = "lenient_u64")]
    pub market_value: Option<u64>,
}

impl ParcelAttributes {
    /// Acreage used for filtering; absent values count as zero.
    #[must_use]
    pub fn acres_or_zero(&self) -> f64 {
        self.acres.unwrap_or(0.0)
    }

    /// Market value used for filtering; absent values count as zero.
    #[must_use]
    pub fn market_value_or_zero(&self) -> u64 {
        self.market_value.unwrap_or(0)
    }
}

/// Attributes of a point of interest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfInterestAttributes {
    /// Display name, matched by search.
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Free-form category (e.g. "Gym", "Climbing").
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    /// Street address.
    #[serde(default, deserialize_with = "lenient_string")]
    pub addr: Option<String>,
    /// Phone number.
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    /// Website URL.
    #[serde(default, deserialize_with = "lenient_string")]
    pub website: Option<String>,
}

/// Median household income bracket used by the choropleth.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncomeBracket {
    /// $75,000 and above.
    High,
    /// $50,000 up to $75,000.
    Medium,
    /// Below $50,000.
    Low,
    /// No published estimate.
    #[default]
    Nodata,
}

/// Lower bound of the high income bracket, in dollars.
pub const HIGH_INCOME_THRESHOLD: i64 = 75_000;
/// Lower bound of the medium income bracket, in dollars.
pub const MEDIUM_INCOME_THRESHOLD: i64 = 50_000;

impl IncomeBracket {
    /// Classifies a median household income.
    ///
    /// Missing and negative values (the Census API uses large negative
    /// sentinels for suppressed estimates) are [`Self::Nodata`].
    #[must_use]
    pub const fn classify(median_income: Option<i64>) -> Self {
        match median_income {
            None => Self::Nodata,
            Some(v) if v < 0 => Self::Nodata,
            Some(v) if v >= HIGH_INCOME_THRESHOLD => Self::High,
            Some(v) if v >= MEDIUM_INCOME_THRESHOLD => Self::Medium,
            Some(_) => Self::Low,
        }
    }

    /// Legend / popup label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High ($75K+)",
            Self::Medium => "Medium ($50-75K)",
            Self::Low => "Low (<$50K)",
            Self::Nodata => "No data",
        }
    }

    /// Choropleth fill colour.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::High => "#2d8a4e",
            Self::Medium => "#d4a017",
            Self::Low => "#c0392b",
            Self::Nodata => "#999",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::High, Self::Medium, Self::Low, Self::Nodata]
    }
}

/// Attributes of a census tract in the income overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTractAttributes {
    /// Census GEOID (state + county + tract).
    #[serde(rename = "GEOID", default, deserialize_with = "lenient_string")]
    pub geoid: Option<String>,
    /// Short tract name, e.g. "Census Tract 401".
    #[serde(default, deserialize_with = "lenient_string")]
    pub tract_name: Option<String>,
    /// ACS median household income.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub median_income: Option<i64>,
    /// Bracket derived from `median_income`.
    #[serde(default, deserialize_with = "lenient_bracket")]
    pub income_bracket: IncomeBracket,
}

// ── Lenient property parsing ────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    fn into_string(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(n) => Some(n.to_string()),
            Self::Other(_) => None,
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let loose = Option::<Loose>::deserialize(deserializer)?;
    Ok(loose
        .as_ref()
        .and_then(Loose::as_f64)
        .filter(|v| *v >= 0.0))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let loose = Option::<Loose>::deserialize(deserializer)?;
    Ok(loose
        .as_ref()
        .and_then(Loose::as_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64))
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let loose = Option::<Loose>::deserialize(deserializer)?;
    Ok(loose.as_ref().and_then(Loose::as_f64).map(|v| v as i64))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let loose = Option::<Loose>::deserialize(deserializer)?;
    Ok(loose.and_then(Loose::into_string))
}

fn lenient_zone<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ZoneCategory>, D::Error> {
    Ok(lenient_string(deserializer)?.and_then(|s| s.parse().ok()))
}

fn lenient_bracket<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<IncomeBracket, D::Error> {
    Ok(lenient_string(deserializer)?
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}
