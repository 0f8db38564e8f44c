//! `GeoJSON` property keys shared by the loaders, the filter expressions,
//! and the preprocessing tools.

/// Parcel number.
pub const PARCEL_ID: &str = "PARCEL_ID";
/// Derived zoning category.
pub const ZONE_CAT: &str = "ZONE_CAT";
/// County use code.
pub const USECODE: &str = "USECODE";
/// Parcel area in acres.
pub const GIS_ACRES: &str = "GIS_ACRES";
/// Parcel area in square feet.
pub const GIS_SQ_FT: &str = "GIS_SQ_FT";
/// Situs address line.
pub const SITUSLINE1: &str = "SITUSLINE1";
/// Situs city.
pub const SITUSCITY: &str = "SITUSCITY";
/// Situs ZIP code.
pub const SITUSZIP: &str = "SITUSZIP";
/// Total market value.
pub const MKTTL: &str = "MKTTL";

/// Parcel properties kept by the field-stripping preprocessor (the derived
/// [`ZONE_CAT`] is added on top).
pub const KEPT_PARCEL_FIELDS: &[&str] = &[
    PARCEL_ID, USECODE, GIS_ACRES, GIS_SQ_FT, SITUSLINE1, SITUSCITY, SITUSZIP, MKTTL,
];

/// Point-of-interest display name.
pub const POI_NAME: &str = "name";

/// Census tract GEOID.
pub const GEOID: &str = "GEOID";
/// Income bracket key used by the choropleth `match` expression.
pub const INCOME_BRACKET: &str = "income_bracket";
