#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory feature store for the parcel map.
//!
//! Holds the parcel collection, the point-of-interest collection, and the
//! derived overlays (buffer rings, income tracts) for one session. Data is
//! brought in by a [`pipeline::LoadPipeline`]: an ordered list of stages,
//! each either required or optional, fetched one after another from disk
//! or HTTP. A failed required stage aborts the load with a [`LoadError`];
//! a failed optional stage is logged and skipped.

pub mod buffer;
pub mod geometry;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod spatial;
mod store;

pub use store::{FeatureStore, IncomeTract, Parcel, PointOfInterest};

use pipeline::StageKind;
use thiserror::Error;

/// Errors from fetching or parsing a data source.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The document is not valid JSON / `GeoJSON`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed, but is not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection, found {found}")]
    NotFeatureCollection {
        /// The kind of `GeoJSON` object that was found instead.
        found: &'static str,
    },

    /// A required stage produced no collection.
    #[error("No data was loaded for the {stage} stage")]
    MissingStage {
        /// The stage that produced nothing.
        stage: StageKind,
    },
}

/// A required load stage failed; the session cannot continue.
#[derive(Debug, Error)]
#[error("Failed to load {stage}: {source}")]
pub struct LoadError {
    /// Which stage failed.
    pub stage: StageKind,
    /// The underlying cause.
    #[source]
    pub source: StoreError,
}
