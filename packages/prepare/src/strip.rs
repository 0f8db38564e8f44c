//! Parcel field stripping.
//!
//! The county export is several hundred megabytes, so features are
//! deserialized one at a time from the `features` array and written out
//! as soon as they are processed. Nothing but the current feature is held
//! in memory.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parcel_map_parcel_models::ZoneCategory;
use parcel_map_parcel_models::properties::{KEPT_PARCEL_FIELDS, USECODE, ZONE_CAT};
use parcel_map_store::progress::ProgressCallback;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::PrepareError;

/// Coordinate precision of the stripped output.
pub const COORDINATE_DECIMALS: i32 = 6;

/// Use-code first digits whose whole category is dropped
/// (transportation, resource/agriculture, government).
const EXCLUDED_CATEGORIES: [char; 3] = ['4', '8', '9'];

/// The only residential use code kept (single-family residence).
const KEPT_RESIDENTIAL_CODE: &str = "111";

/// Three-digit use codes dropped individually.
const EXCLUDED_CODES: &[&str] = &[
    // Residential
    "118", "198",
    // Commercial
    "211", "212", "213", "214", "215", "216",
    // Industrial
    "311", "312", "313", "314", "315",
    // Trade
    "511", "512", "513", "514", "515", "516", "517", "518", "519", "599",
    // Services
    "611", "612", "613", "614", "621", "622", "623", "631", "632", "633", "634", "636", "638",
    "641", "651", "699",
    // Cultural/Recreation
    "711", "712", "713", "714", "715", "716", "717", "721", "742", "743",
];

/// Whether a parcel with this use code is dropped.
///
/// Blank codes, whole excluded categories, the listed three-digit codes,
/// and every residential code other than single-family are dropped.
#[must_use]
pub fn is_excluded(use_code: Option<&str>) -> bool {
    let Some(code) = use_code.map(str::trim).filter(|c| !c.is_empty()) else {
        return true;
    };
    let prefix: String = code.chars().take(3).collect();
    code.starts_with(EXCLUDED_CATEGORIES)
        || EXCLUDED_CODES.contains(&prefix.as_str())
        || (code.starts_with('1') && prefix != KEPT_RESIDENTIAL_CODE)
}

/// The `ZONE_CAT` label written for a use code.
#[must_use]
pub fn zone_label(use_code: &str) -> String {
    ZoneCategory::from_use_code(use_code)
        .unwrap_or(ZoneCategory::Other)
        .to_string()
}

/// Outcome of a strip run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripSummary {
    /// Parcels written.
    pub kept: u64,
    /// Parcels dropped by use code.
    pub excluded: u64,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

fn use_code_of(properties: &Map<String, Value>) -> Option<String> {
    match properties.get(USECODE)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reduces one raw feature to the kept fields, or `None` if it is
/// excluded.
fn strip_feature(feature: RawFeature) -> Option<Value> {
    let properties = feature.properties.unwrap_or_default();
    let use_code = use_code_of(&properties);
    if is_excluded(use_code.as_deref()) {
        return None;
    }

    let mut kept: Map<String, Value> = KEPT_PARCEL_FIELDS
        .iter()
        .filter_map(|field| {
            properties
                .get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect();
    kept.insert(
        ZONE_CAT.to_string(),
        Value::String(zone_label(use_code.as_deref().unwrap_or_default())),
    );

    let mut geometry = feature.geometry.unwrap_or(Value::Null);
    crate::round_geometry(&mut geometry, COORDINATE_DECIMALS);

    Some(serde_json::json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": kept,
    }))
}

/// Streams the `FeatureCollection` in `reader`, writing the stripped
/// collection to `writer`.
///
/// # Errors
///
/// Returns [`PrepareError::Json`] if the input is not a JSON object with a
/// `features` array, or [`PrepareError::Io`] if writing fails.
pub fn strip_parcels<R: Read, W: Write>(
    reader: R,
    writer: W,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StripSummary, PrepareError> {
    let mut writer = writer;
    let mut summary = StripSummary::default();
    writer.write_all(b"{\"type\":\"FeatureCollection\",\"features\":[\n")?;

    for_each_feature(reader, |feature| {
        progress.inc(1);
        let Some(stripped) = strip_feature(feature) else {
            summary.excluded += 1;
            return Ok(());
        };
        if summary.kept > 0 {
            writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut writer, &stripped)?;
        summary.kept += 1;
        Ok(())
    })?;

    writer.write_all(b"\n]}\n")?;
    writer.flush()?;
    progress.finish(format!(
        "{} kept, {} excluded",
        summary.kept, summary.excluded
    ));
    Ok(summary)
}

/// Strips `input` into `output`, creating the output's parent directory.
///
/// # Errors
///
/// See [`strip_parcels`]; also fails if either file cannot be opened.
pub fn strip_file(
    input: &Path,
    output: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StripSummary, PrepareError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    log::info!("Stripping {} -> {}", input.display(), output.display());
    strip_parcels(reader, writer, progress)
}

// ── Streaming deserialization ───────────────────────────────────────

/// Calls `visit` for every element of the top-level `features` array,
/// without materializing the collection.
fn for_each_feature<R, F>(reader: R, mut visit: F) -> Result<(), PrepareError>
where
    R: Read,
    F: FnMut(RawFeature) -> Result<(), PrepareError>,
{
    let mut failure = None;
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let result = Collection {
        visit: &mut visit,
        failure: &mut failure,
    }
    .deserialize(&mut deserializer);

    if let Some(e) = failure {
        return Err(e);
    }
    result?;
    deserializer.end()?;
    Ok(())
}

struct Collection<'a, F> {
    visit: &'a mut F,
    failure: &'a mut Option<PrepareError>,
}

impl<'de, F> DeserializeSeed<'de> for Collection<'_, F>
where
    F: FnMut(RawFeature) -> Result<(), PrepareError>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for Collection<'_, F>
where
    F: FnMut(RawFeature) -> Result<(), PrepareError>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a GeoJSON FeatureCollection")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let Self { visit, failure } = self;
        let mut saw_features = false;
        while let Some(key) = map.next_key::<String>()? {
            if key == "features" {
                saw_features = true;
                map.next_value_seed(Features {
                    visit: &mut *visit,
                    failure: &mut *failure,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        if saw_features {
            Ok(())
        } else {
            Err(de::Error::missing_field("features"))
        }
    }
}

struct Features<'a, F> {
    visit: &'a mut F,
    failure: &'a mut Option<PrepareError>,
}

impl<'de, F> DeserializeSeed<'de> for Features<'_, F>
where
    F: FnMut(RawFeature) -> Result<(), PrepareError>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for Features<'_, F>
where
    F: FnMut(RawFeature) -> Result<(), PrepareError>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of GeoJSON features")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(feature) = seq.next_element::<RawFeature>()? {
            if let Err(e) = (self.visit)(feature) {
                let message = e.to_string();
                *self.failure = Some(e);
                return Err(de::Error::custom(message));
            }
        }
        Ok(())
    }
}
