//! Viewer configuration.
//!
//! The defaults live in `config/viewer.toml` and are embedded at compile
//! time. An override file only needs the keys it changes; it is merged
//! table by table over the defaults before deserializing.

use std::path::Path;

use parcel_map_filter::FilterLimits;
use parcel_map_store::source::DataSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an override TOML file.
pub const CONFIG_ENV_VAR: &str = "PARCEL_MAP_CONFIG";

const DEFAULT_CONFIG: &str = include_str!("../config/viewer.toml");

/// Errors from loading or validating the viewer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the override file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed or did not match the expected shape.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A numeric setting is outside its allowed range.
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// Where the three collections are loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Parcel collection (required).
    pub parcels: DataSource,
    /// Point-of-interest collection (required).
    pub points_of_interest: DataSource,
    /// Income tract collection (optional at runtime).
    pub income_tracts: DataSource,
}

/// Camera positions and animation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// `[lng, lat]` at startup.
    pub initial_center: [f64; 2],
    /// Zoom at startup.
    pub initial_zoom: f64,
    /// Maximum zoom the map allows.
    pub max_zoom: f64,
    /// Zoom used when centring on a single point of interest.
    pub poi_zoom: f64,
    /// Padding in pixels when framing a bounding region.
    pub fit_padding: f64,
    /// Zoom ceiling when framing a bounding region.
    pub fit_max_zoom: f64,
    /// Camera animation length.
    pub fly_duration_ms: u64,
}

/// Buffer rings derived around points of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffersConfig {
    /// One ring set per radius, in miles.
    pub radii_miles: Vec<f64>,
}

/// Complete viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Data source locations.
    pub data: DataConfig,
    /// Slider sentinels and initial positions.
    pub filter: FilterLimits,
    /// Camera settings.
    pub camera: CameraConfig,
    /// Buffer ring radii.
    pub buffers: BuffersConfig,
}

impl ViewerConfig {
    /// The embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded file fails to parse or
    /// validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_override_str("")
    }

    /// The embedded defaults with `overrides` (TOML text) merged on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML or unknown shapes
    /// and [`ConfigError::InvalidRange`] if validation fails.
    pub fn from_override_str(overrides: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        let overrides: toml::Table = toml::from_str(overrides)?;
        merge(&mut table, overrides);

        let config: Self = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded defaults with the file at `path` merged on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// as [`Self::from_override_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Reading viewer configuration overrides from {}", path.display());
        Self::from_override_str(&std::fs::read_to_string(path)?)
    }

    /// Reads overrides from the file named by `PARCEL_MAP_CONFIG`, or
    /// returns the embedded defaults when it is unset.
    ///
    /// # Errors
    ///
    /// As [`Self::from_path`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_path(path),
            _ => Self::embedded(),
        }
    }

    /// Checks every numeric range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRange`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter
            .validate()
            .map_err(|e| ConfigError::InvalidRange(e.to_string()))?;

        let camera = &self.camera;
        if !(camera.initial_zoom >= 0.0 && camera.initial_zoom <= camera.max_zoom) {
            return Err(ConfigError::InvalidRange(format!(
                "camera.initial_zoom {} must lie between 0 and max_zoom {}",
                camera.initial_zoom, camera.max_zoom
            )));
        }
        for (name, zoom) in [("poi_zoom", camera.poi_zoom), ("fit_max_zoom", camera.fit_max_zoom)] {
            if !(zoom >= 0.0 && zoom <= camera.max_zoom) {
                return Err(ConfigError::InvalidRange(format!(
                    "camera.{name} {zoom} must lie between 0 and max_zoom {}",
                    camera.max_zoom
                )));
            }
        }
        if !(camera.fit_padding >= 0.0) {
            return Err(ConfigError::InvalidRange(format!(
                "camera.fit_padding {} must not be negative",
                camera.fit_padding
            )));
        }

        if let Some(radius) = self
            .buffers
            .radii_miles
            .iter()
            .find(|r| !(r.is_finite() && **r > 0.0))
        {
            return Err(ConfigError::InvalidRange(format!(
                "buffers.radii_miles entry {radius} must be positive"
            )));
        }

        Ok(())
    }
}

fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn embedded_defaults() {
        let config = ViewerConfig::embedded().unwrap();
        assert_eq!(config.filter, FilterLimits::default());
        assert_eq!(config.camera.initial_center, [-122.2, 48.0]);
        assert!((config.camera.poi_zoom - 16.0).abs() < f64::EPSILON);
        assert!((config.camera.fit_max_zoom - 17.0).abs() < f64::EPSILON);
        assert_eq!(config.camera.fly_duration_ms, 1500);
        assert_eq!(config.buffers.radii_miles, vec![3.0, 5.0]);
        assert_eq!(
            config.data.parcels,
            DataSource::File("public/parcels-web.geojson".into())
        );
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = ViewerConfig::from_override_str(
            r#"
            [filter]
            acreage_min_default = 2.0

            [data]
            parcels = "https://example.com/parcels.geojson"
            "#,
        )
        .unwrap();
        assert!((config.filter.acreage_min_default - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.filter.value_max, 2_000_000);
        assert!(matches!(config.data.parcels, DataSource::Url(_)));
        assert_eq!(
            config.data.points_of_interest,
            DataSource::File("public/gyms.geojson".into())
        );
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let err = ViewerConfig::from_override_str("[filter]\nacreage_min_default = 500.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange(_)), "got {err}");

        let err = ViewerConfig::from_override_str("[buffers]\nradii_miles = [3.0, -1.0]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange(_)), "got {err}");

        let err = ViewerConfig::from_override_str("[camera]\npoi_zoom = 30.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange(_)), "got {err}");
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = ViewerConfig::from_override_str("[filter\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "got {err}");
    }

    #[test]
    fn reads_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[camera]\ninitial_zoom = 12.0").unwrap();
        let config = ViewerConfig::from_path(file.path()).unwrap();
        assert!((config.camera.initial_zoom - 12.0).abs() < f64::EPSILON);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ViewerConfig::from_path(missing),
            Err(ConfigError::Io(_))
        ));
    }
}
