//! Census income tract builder.
//!
//! Fetches tract boundaries from the `TIGERweb` REST API and ACS 5-year
//! median household income (`B19013_001E`) from the Census Data API,
//! joins them on GEOID, and writes the income overlay collection.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parcel_map_parcel_models::{IncomeBracket, IncomeTractAttributes};
use parcel_map_store::progress::ProgressCallback;
use serde_json::{Value, json};

use crate::PrepareError;

/// Coordinate precision of the income overlay.
pub const COORDINATE_DECIMALS: i32 = 5;

/// ACS variable for median household income.
pub const MEDIAN_INCOME_VARIABLE: &str = "B19013_001E";

/// Value the Census API publishes for suppressed estimates.
const SUPPRESSED_ESTIMATE: i64 = -666_666_666;

/// Page size for `TIGERweb` requests.
const TIGERWEB_PAGE_SIZE: u32 = 500;

const USER_AGENT: &str = "ParcelMap/1.0 (census income overlay)";

/// Which county and survey to build the overlay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeRequest {
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Three-digit county FIPS code.
    pub county_fips: String,
    /// ACS vintage, e.g. `2022`.
    pub acs_year: String,
}

impl Default for IncomeRequest {
    /// Snohomish County, Washington, ACS 2022.
    fn default() -> Self {
        Self {
            state_fips: "53".to_string(),
            county_fips: "061".to_string(),
            acs_year: "2022".to_string(),
        }
    }
}

impl IncomeRequest {
    /// `TIGERweb` census tract query (layer 6 of the matching ACS
    /// service), without paging parameters.
    #[must_use]
    pub fn tigerweb_url(&self) -> String {
        format!(
            "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_ACS{year}/MapServer/6/query\
             ?where=STATE%3D'{state}'+AND+COUNTY%3D'{county}'\
             &outFields=GEOID,NAME,STATE,COUNTY,TRACT\
             &outSR=4326&f=geojson&returnGeometry=true",
            year = self.acs_year,
            state = self.state_fips,
            county = self.county_fips,
        )
    }

    /// Census Data API query for median household income of every tract
    /// in the county.
    #[must_use]
    pub fn census_url(&self) -> String {
        format!(
            "https://api.census.gov/data/{year}/acs/acs5\
             ?get=NAME,{MEDIAN_INCOME_VARIABLE}\
             &for=tract:*\
             &in=state:{state}%20county:{county}",
            year = self.acs_year,
            state = self.state_fips,
            county = self.county_fips,
        )
    }
}

/// Builds a `reqwest::Client` for the census services.
///
/// # Errors
///
/// Returns [`PrepareError::Http`] if the client cannot be built.
pub fn build_client() -> Result<reqwest::Client, PrepareError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(Into::into)
}

fn truncate_for_log(s: &str, max_len: usize) -> &str {
    s.char_indices()
        .nth(max_len)
        .map_or(s, |(end, _)| &s[..end])
}

async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value, PrepareError> {
    log::info!("Fetching: {}...", truncate_for_log(url, 100));
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let json: Value = serde_json::from_str(&body)?;

    // ArcGIS reports failures inside a 200 response.
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(PrepareError::Census {
            message: format!("ArcGIS error {code}: {message}"),
        });
    }
    Ok(json)
}

/// Fetches every tract feature, following `exceededTransferLimit` pages.
async fn fetch_tract_features(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<Value>, PrepareError> {
    let mut features = Vec::new();
    let mut offset = 0u32;

    loop {
        let url =
            format!("{base_url}&resultRecordCount={TIGERWEB_PAGE_SIZE}&resultOffset={offset}");
        let mut page = fetch_json(client, &url).await?;

        let Some(Value::Array(batch)) = page.get_mut("features").map(Value::take) else {
            return Err(PrepareError::Census {
                message: format!("No features array in TIGERweb response (offset={offset})"),
            });
        };
        if batch.is_empty() {
            break;
        }

        #[allow(clippy::cast_possible_truncation)]
        let page_len = batch.len() as u32;
        features.extend(batch);

        let exceeded = page
            .get("exceededTransferLimit")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !exceeded {
            break;
        }
        offset += page_len;
        log::info!("Fetched {} tracts so far, fetching next page...", features.len());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    Ok(features)
}

/// Income published for one tract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TractIncome {
    /// Full tract name, e.g. `Census Tract 401; Snohomish County; Washington`.
    pub name: String,
    /// Median household income, `None` when suppressed or missing.
    pub median_income: Option<i64>,
}

fn parse_estimate(raw: Option<&str>) -> Option<i64> {
    let value: f64 = raw?.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let value = value as i64;
    (value != SUPPRESSED_ESTIMATE).then_some(value)
}

/// Parses a Census Data API table (header row, then one row per tract)
/// into incomes keyed by GEOID.
///
/// # Errors
///
/// Returns [`PrepareError::Census`] if the table is empty or lacks one of
/// the expected columns.
pub fn parse_income_table(
    rows: &[Vec<Option<String>>],
) -> Result<BTreeMap<String, TractIncome>, PrepareError> {
    let Some((header, rows)) = rows.split_first() else {
        return Err(PrepareError::Census {
            message: "Census API returned an empty table".to_string(),
        });
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.as_deref() == Some(name))
            .ok_or_else(|| PrepareError::Census {
                message: format!("Census API response has no {name} column"),
            })
    };
    let name_idx = column("NAME")?;
    let income_idx = column(MEDIAN_INCOME_VARIABLE)?;
    let state_idx = column("state")?;
    let county_idx = column("county")?;
    let tract_idx = column("tract")?;

    let mut incomes = BTreeMap::new();
    for row in rows {
        let (Some(state), Some(county), Some(tract)) = (
            cell(row, state_idx),
            cell(row, county_idx),
            cell(row, tract_idx),
        ) else {
            log::debug!("Skipping census row without a full GEOID: {row:?}");
            continue;
        };
        incomes.insert(
            format!("{state}{county}{tract}"),
            TractIncome {
                name: cell(row, name_idx).unwrap_or_default(),
                median_income: parse_estimate(cell(row, income_idx).as_deref()),
            },
        );
    }
    Ok(incomes)
}

fn cell(row: &[Option<String>], idx: usize) -> Option<String> {
    row.get(idx).cloned().flatten()
}

/// Short tract name: everything before the first `;`, trimmed.
#[must_use]
pub fn short_tract_name(name: &str) -> String {
    name.split(';').next().unwrap_or_default().trim().to_string()
}

/// Outcome of joining boundaries with incomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomeSummary {
    /// Tracts written.
    pub tracts: usize,
    /// Tracts with a published median income.
    pub with_income: usize,
}

/// Joins `TIGERweb` tract features with incomes, producing the overlay
/// collection. Tracts are keyed by GEOID; a repeated GEOID keeps the last
/// feature.
#[must_use]
pub fn join_tracts(
    features: Vec<Value>,
    incomes: &BTreeMap<String, TractIncome>,
) -> (Value, IncomeSummary) {
    let mut by_geoid = BTreeMap::new();
    for feature in features {
        let Some(geoid) = feature
            .pointer("/properties/GEOID")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            log::warn!("Skipping tract feature without a GEOID");
            continue;
        };
        by_geoid.insert(geoid, feature);
    }

    let mut summary = IncomeSummary::default();
    let features: Vec<Value> = by_geoid
        .into_iter()
        .map(|(geoid, mut feature)| {
            let income = incomes.get(&geoid);
            let median_income = income.and_then(|i| i.median_income);
            let raw_name = income.map_or_else(
                || {
                    feature
                        .pointer("/properties/NAME")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                },
                |i| i.name.clone(),
            );

            let mut geometry = feature.get_mut("geometry").map_or(Value::Null, Value::take);
            crate::round_geometry(&mut geometry, COORDINATE_DECIMALS);

            summary.tracts += 1;
            if median_income.is_some() {
                summary.with_income += 1;
            }

            let attributes = IncomeTractAttributes {
                geoid: Some(geoid),
                tract_name: Some(short_tract_name(&raw_name)),
                median_income,
                income_bracket: IncomeBracket::classify(median_income),
            };
            json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": attributes,
            })
        })
        .collect();

    (
        json!({ "type": "FeatureCollection", "features": features }),
        summary,
    )
}

/// Fetches, joins, and writes the income overlay to `output`.
///
/// # Errors
///
/// Returns [`PrepareError::Http`] or [`PrepareError::Census`] if either
/// service fails or returns no tracts, and [`PrepareError::Io`] if the
/// output cannot be written.
pub async fn build_income_tracts(
    client: &reqwest::Client,
    request: &IncomeRequest,
    output: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<IncomeSummary, PrepareError> {
    progress.set_total(3);

    progress.set_message("Fetching tract geometries from TIGERweb".to_string());
    let features = fetch_tract_features(client, &request.tigerweb_url()).await?;
    log::info!("Got {} tract geometries", features.len());
    if features.is_empty() {
        return Err(PrepareError::Census {
            message: "No tract geometries returned. Check the TIGERweb URL.".to_string(),
        });
    }
    progress.inc(1);

    progress.set_message("Fetching median household income".to_string());
    let table = fetch_json(client, &request.census_url()).await?;
    let rows: Vec<Vec<Option<String>>> = serde_json::from_value(table)?;
    let incomes = parse_income_table(&rows)?;
    log::info!("Got income data for {} tracts", incomes.len());
    progress.inc(1);

    progress.set_message("Joining".to_string());
    let (collection, summary) = join_tracts(features, &incomes);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, serde_json::to_vec(&collection)?)?;
    progress.inc(1);
    progress.finish(format!("{} tracts", summary.tracts));

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    fn table() -> Vec<Vec<Option<String>>> {
        vec![
            row(&[Some("NAME"), Some("B19013_001E"), Some("state"), Some("county"), Some("tract")]),
            row(&[
                Some("Census Tract 401; Snohomish County; Washington"),
                Some("81250"),
                Some("53"),
                Some("061"),
                Some("040100"),
            ]),
            row(&[
                Some("Census Tract 418.02; Snohomish County; Washington"),
                Some("-666666666"),
                Some("53"),
                Some("061"),
                Some("041802"),
            ]),
            row(&[Some("Census Tract 9"), None, Some("53"), Some("061"), Some("000900")]),
        ]
    }

    #[test]
    fn urls_target_the_requested_county() {
        let request = IncomeRequest::default();
        let tiger = request.tigerweb_url();
        assert!(tiger.contains("tigerWMS_ACS2022/MapServer/6/query"), "{tiger}");
        assert!(tiger.contains("STATE%3D'53'+AND+COUNTY%3D'061'"), "{tiger}");
        assert_eq!(
            request.census_url(),
            "https://api.census.gov/data/2022/acs/acs5?get=NAME,B19013_001E\
             &for=tract:*&in=state:53%20county:061"
        );
    }

    #[test]
    fn parses_income_table() {
        let incomes = parse_income_table(&table()).unwrap();
        assert_eq!(incomes.len(), 3);
        assert_eq!(incomes["53061040100"].median_income, Some(81_250));
        assert_eq!(incomes["53061041802"].median_income, None);
        assert_eq!(incomes["53061000900"].median_income, None);
    }

    #[test]
    fn missing_column_is_reported() {
        let rows = vec![row(&[Some("NAME"), Some("state")])];
        let err = parse_income_table(&rows).unwrap_err();
        assert!(err.to_string().contains("B19013_001E"), "{err}");
        assert!(parse_income_table(&[]).is_err());
    }

    #[test]
    fn decimal_estimates_truncate() {
        assert_eq!(parse_estimate(Some("52000.0")), Some(52_000));
        assert_eq!(parse_estimate(Some("-666666666.0")), None);
        assert_eq!(parse_estimate(Some("n/a")), None);
        assert_eq!(parse_estimate(Some("-5")), Some(-5));
    }

    #[test]
    fn short_names_drop_county_and_state() {
        assert_eq!(
            short_tract_name("Census Tract 401; Snohomish County; Washington"),
            "Census Tract 401"
        );
        assert_eq!(short_tract_name("  Tract 9 "), "Tract 9");
        assert_eq!(short_tract_name(""), "");
    }

    #[test]
    fn joins_boundaries_with_incomes() {
        let incomes = parse_income_table(&table()).unwrap();
        let features = vec![
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[
                    [-122.123_456_7, 48.0], [-122.0, 48.0], [-122.0, 48.1], [-122.123_456_7, 48.0]
                ]]},
                "properties": { "GEOID": "53061040100", "NAME": "Census Tract 401" }
            }),
            json!({
                "type": "Feature",
                "geometry": null,
                "properties": { "GEOID": "53061041802", "NAME": "Census Tract 418.02" }
            }),
            json!({
                "type": "Feature",
                "geometry": null,
                "properties": { "GEOID": "53061099999", "NAME": "Census Tract 999.99" }
            }),
            json!({ "type": "Feature", "geometry": null, "properties": {} }),
        ];

        let (collection, summary) = join_tracts(features, &incomes);
        assert_eq!(summary, IncomeSummary { tracts: 3, with_income: 1 });

        let out = collection["features"].as_array().unwrap();
        let props = |i: usize| &out[i]["properties"];
        assert_eq!(props(0)["GEOID"], "53061040100");
        assert_eq!(props(0)["tract_name"], "Census Tract 401");
        assert_eq!(props(0)["median_income"], 81_250);
        assert_eq!(props(0)["income_bracket"], "high");
        assert_eq!(out[0]["geometry"]["coordinates"][0][0], json!([-122.123_46, 48.0]));

        assert_eq!(props(1)["tract_name"], "Census Tract 418.02");
        assert_eq!(props(1)["median_income"], Value::Null);
        assert_eq!(props(1)["income_bracket"], "nodata");

        assert_eq!(props(2)["tract_name"], "Census Tract 999.99");
        assert_eq!(props(2)["income_bracket"], "nodata");
    }
}
