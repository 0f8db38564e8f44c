//! Where a collection is read from: a local file or an HTTP(S) URL.

use std::path::PathBuf;

use geojson::{FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Location of a `GeoJSON` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSource {
    /// A path on the local filesystem.
    File(PathBuf),
    /// An `http://` or `https://` URL.
    Url(String),
}

impl From<String> for DataSource {
    fn from(value: String) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value)
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

impl From<&str> for DataSource {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DataSource> for String {
    fn from(value: DataSource) -> Self {
        match value {
            DataSource::File(path) => path.display().to_string(),
            DataSource::Url(url) => url,
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl DataSource {
    /// Reads the raw document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, or
    /// [`StoreError::Http`] if the request fails or the server answers
    /// with a non-success status.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, StoreError> {
        match self {
            Self::File(path) => Ok(tokio::fs::read(path).await?),
            Self::Url(url) => {
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }

    /// Fetches and parses the document as a `FeatureCollection`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the fetch fails, the body is not valid
    /// `GeoJSON`, or it is not a `FeatureCollection`.
    pub async fn fetch_collection(
        &self,
        client: &reqwest::Client,
    ) -> Result<FeatureCollection, StoreError> {
        let bytes = self.fetch(client).await?;
        parse_feature_collection(&bytes)
    }
}

/// Parses a `GeoJSON` document that must be a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`StoreError::Json`] on malformed input and
/// [`StoreError::NotFeatureCollection`] for any other `GeoJSON` object.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection, StoreError> {
    match serde_json::from_slice::<GeoJson>(bytes)? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(_) => Err(StoreError::NotFeatureCollection { found: "Feature" }),
        GeoJson::Geometry(_) => Err(StoreError::NotFeatureCollection { found: "Geometry" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_paths_are_distinguished() {
        assert_eq!(
            DataSource::from("https://example.com/parcels.geojson"),
            DataSource::Url("https://example.com/parcels.geojson".to_string())
        );
        assert_eq!(
            DataSource::from("public/parcels-web.geojson"),
            DataSource::File(PathBuf::from("public/parcels-web.geojson"))
        );
    }

    #[test]
    fn rejects_non_collection_documents() {
        let err = parse_feature_collection(
            br#"{"type":"Feature","geometry":null,"properties":{}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFeatureCollection { found: "Feature" }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_feature_collection(b"{not json").unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::File(dir.path().join("absent.geojson"));
        let err = source
            .fetch_collection(&reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
