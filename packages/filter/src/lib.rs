#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel filtering.
//!
//! [`FilterState`] holds the values of the sidebar controls (zoning
//! checkboxes, acreage and market-value range sliders, city selector).
//! [`compile`] turns a state into a predicate in one of two output modes:
//! a `MapLibre`-style declarative expression for the renderer
//! ([`Expression`]) or an in-process [`Predicate`] used to count matches
//! ([`Evaluator`]). Both modes are driven by the same rule-selection code,
//! so they always agree on which parcels match.

pub mod compile;
pub mod format;
pub mod state;

pub use compile::{CompiledFilter, Evaluator, Expression, OutputMode, Predicate, compile};
pub use state::{FilterLimits, FilterState};

use thiserror::Error;

/// Errors from building filter limits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// A sentinel maximum was zero, negative, or not finite.
    #[error("Invalid {field} maximum {value}: must be positive")]
    InvalidMaximum {
        /// Which limit was rejected.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A default lower bound fell outside `[0, max]`.
    #[error("Invalid {field} default {value}: must lie between 0 and {max}")]
    DefaultOutOfRange {
        /// Which limit was rejected.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// The corresponding sentinel maximum.
        max: f64,
    },
}
