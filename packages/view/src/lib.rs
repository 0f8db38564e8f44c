#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! View controller for the parcel map.
//!
//! A [`Session`] ties the loaded [`parcel_map_store::FeatureStore`], the
//! sidebar filter state, and search together, and reconciles them onto a
//! rendering engine through the [`renderer::MapRenderer`] and
//! [`renderer::Sidebar`] traits. The layer catalogue in [`layers`] is the
//! single description of what gets drawn; [`headless`] provides an
//! in-memory renderer that evaluates the same declarative filters a real
//! one would.

pub mod config;
pub mod expression;
pub mod headless;
pub mod layers;
pub mod popup;
pub mod renderer;
pub mod session;

pub use config::{ConfigError, ViewerConfig};
pub use layers::{Basemap, Overlay};
pub use session::{Session, SessionState};
