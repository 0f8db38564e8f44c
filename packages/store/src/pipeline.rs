//! Ordered, sequential data loading.
//!
//! A [`LoadPipeline`] is a list of [`Stage`]s. Stages run strictly one
//! after another; each is awaited before the next begins. When a
//! [`Requirement::Required`] stage fails the pipeline stops and returns a
//! [`LoadError`] naming the stage. When a [`Requirement::Optional`] stage
//! fails the failure is logged and loading continues without it.

use std::collections::BTreeMap;
use std::sync::Arc;

use geojson::FeatureCollection;
use strum_macros::{AsRefStr, Display};

use crate::progress::{ProgressCallback, null_progress};
use crate::source::DataSource;
use crate::{FeatureStore, LoadError, StoreError};

/// The collections a session can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
pub enum StageKind {
    /// Land parcels.
    #[strum(serialize = "parcels")]
    Parcels,
    /// Points of interest.
    #[strum(serialize = "points of interest")]
    PointsOfInterest,
    /// Census income tracts.
    #[strum(serialize = "income tracts")]
    IncomeTracts,
}

/// Whether a stage failing aborts the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Failure aborts the pipeline.
    Required,
    /// Failure is logged and the stage is skipped.
    Optional,
}

/// One step of the pipeline.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Which collection this stage produces.
    pub kind: StageKind,
    /// Where to read it from.
    pub source: DataSource,
    /// Whether the session can proceed without it.
    pub requirement: Requirement,
}

/// Sequential loader producing a [`FeatureStore`].
pub struct LoadPipeline {
    stages: Vec<Stage>,
    client: reqwest::Client,
    buffer_radii_miles: Vec<f64>,
    progress: Arc<dyn ProgressCallback>,
}

impl LoadPipeline {
    /// An empty pipeline using the given HTTP client for URL sources.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            stages: Vec::new(),
            client,
            buffer_radii_miles: Vec::new(),
            progress: null_progress(),
        }
    }

    /// The viewer's standard chain: parcels, then points of interest
    /// (both required), then income tracts (optional).
    #[must_use]
    pub fn standard(
        client: reqwest::Client,
        parcels: DataSource,
        points_of_interest: DataSource,
        income_tracts: DataSource,
    ) -> Self {
        Self::new(client)
            .stage(StageKind::Parcels, parcels, Requirement::Required)
            .stage(
                StageKind::PointsOfInterest,
                points_of_interest,
                Requirement::Required,
            )
            .stage(StageKind::IncomeTracts, income_tracts, Requirement::Optional)
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, kind: StageKind, source: DataSource, requirement: Requirement) -> Self {
        self.stages.push(Stage {
            kind,
            source,
            requirement,
        });
        self
    }

    /// Radii (miles) of the buffer rings derived around points of interest.
    #[must_use]
    pub fn with_buffer_radii(mut self, radii_miles: Vec<f64>) -> Self {
        self.buffer_radii_miles = radii_miles;
        self
    }

    /// Reports one unit of progress per completed stage.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The configured stages, in run order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs every stage in order and assembles the store.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] for the first required stage that fails, or
    /// if the parcel or point-of-interest collection was never loaded.
    pub async fn run(&self) -> Result<FeatureStore, LoadError> {
        self.progress.set_total(self.stages.len() as u64);
        let mut loaded: BTreeMap<StageKind, FeatureCollection> = BTreeMap::new();

        for stage in &self.stages {
            self.progress.set_message(format!("Loading {}", stage.kind));
            log::info!("Loading {} from {}", stage.kind, stage.source);

            match stage.source.fetch_collection(&self.client).await {
                Ok(collection) => {
                    log::info!(
                        "Loaded {} {} features",
                        collection.features.len(),
                        stage.kind
                    );
                    loaded.insert(stage.kind, collection);
                }
                Err(source) => match stage.requirement {
                    Requirement::Required => {
                        self.progress.finish(format!("Failed to load {}", stage.kind));
                        return Err(LoadError {
                            stage: stage.kind,
                            source,
                        });
                    }
                    Requirement::Optional => {
                        log::warn!("{} not available: {source}", stage.kind);
                    }
                },
            }
            self.progress.inc(1);
        }

        let parcels = take_required(&mut loaded, StageKind::Parcels)?;
        let points_of_interest = take_required(&mut loaded, StageKind::PointsOfInterest)?;
        let income_tracts = loaded.remove(&StageKind::IncomeTracts);

        let store = FeatureStore::from_collections(
            parcels,
            points_of_interest,
            income_tracts,
            &self.buffer_radii_miles,
        )
        .map_err(|source| LoadError {
            stage: StageKind::Parcels,
            source,
        })?;

        self.progress.finish(format!(
            "Loaded {} parcels and {} points of interest",
            store.parcels().len(),
            store.points_of_interest().len()
        ));
        Ok(store)
    }
}

fn take_required(
    loaded: &mut BTreeMap<StageKind, FeatureCollection>,
    stage: StageKind,
) -> Result<FeatureCollection, LoadError> {
    loaded.remove(&stage).ok_or(LoadError {
        stage,
        source: StoreError::MissingStage { stage },
    })
}
