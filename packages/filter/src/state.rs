//! Current values of the filter controls.

use std::collections::BTreeSet;

use parcel_map_parcel_models::ZoneCategory;
use serde::{Deserialize, Serialize};

use crate::{FilterError, format};

/// Slider bounds.
///
/// The maxima are sentinels: a range whose upper bound sits at the
/// sentinel is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLimits {
    /// Acreage slider maximum; at this value acreage is unbounded.
    pub acreage_max: f64,
    /// Market value slider maximum; at this value value is unbounded.
    pub value_max: u64,
    /// Initial / reset position of the acreage lower bound.
    pub acreage_min_default: f64,
    /// Initial / reset position of the value lower bound.
    pub value_min_default: u64,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            acreage_max: 100.0,
            value_max: 2_000_000,
            acreage_min_default: 0.0,
            value_min_default: 0,
        }
    }
}

impl FilterLimits {
    /// Checks that the maxima are positive and the defaults in range.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] naming the offending field.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), FilterError> {
        if !(self.acreage_max.is_finite() && self.acreage_max > 0.0) {
            return Err(FilterError::InvalidMaximum {
                field: "acreage",
                value: self.acreage_max,
            });
        }
        if self.value_max == 0 {
            return Err(FilterError::InvalidMaximum {
                field: "value",
                value: 0.0,
            });
        }
        if !(0.0..=self.acreage_max).contains(&self.acreage_min_default) {
            return Err(FilterError::DefaultOutOfRange {
                field: "acreage",
                value: self.acreage_min_default,
                max: self.acreage_max,
            });
        }
        if self.value_min_default > self.value_max {
            return Err(FilterError::DefaultOutOfRange {
                field: "value",
                value: self.value_min_default as f64,
                max: self.value_max as f64,
            });
        }
        Ok(())
    }
}

/// The active filter constraints.
///
/// Every setter keeps `min <= max` for both ranges: when a new bound would
/// cross its partner, the bound being set snaps to the partner's value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    limits: FilterLimits,
    selected_zones: BTreeSet<ZoneCategory>,
    acreage_min: f64,
    acreage_max: f64,
    value_min: u64,
    value_max: u64,
    city: Option<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FilterLimits::default())
    }
}

impl FilterState {
    /// All zones selected, full ranges, any city.
    #[must_use]
    pub fn new(limits: FilterLimits) -> Self {
        Self {
            limits,
            selected_zones: ZoneCategory::FILTERABLE.iter().copied().collect(),
            acreage_min: limits.acreage_min_default,
            acreage_max: limits.acreage_max,
            value_min: limits.value_min_default,
            value_max: limits.value_max,
            city: None,
        }
    }

    /// Restores the initial state.
    pub fn reset(&mut self) {
        *self = Self::new(self.limits);
    }

    /// Slider bounds this state was created with.
    #[must_use]
    pub const fn limits(&self) -> &FilterLimits {
        &self.limits
    }

    // ── Zoning ──────────────────────────────────────────────────────

    /// Checks or unchecks a zoning category. Categories that are not
    /// offered as checkboxes are ignored.
    pub fn set_zone(&mut self, zone: ZoneCategory, selected: bool) {
        if !ZoneCategory::FILTERABLE.contains(&zone) {
            log::debug!("Ignoring non-filterable zone {zone}");
            return;
        }
        if selected {
            self.selected_zones.insert(zone);
        } else {
            self.selected_zones.remove(&zone);
        }
    }

    /// Replaces the zoning selection.
    pub fn select_only(&mut self, zones: impl IntoIterator<Item = ZoneCategory>) {
        self.selected_zones = zones
            .into_iter()
            .filter(|zone| ZoneCategory::FILTERABLE.contains(zone))
            .collect();
    }

    /// Whether a zoning checkbox is checked.
    #[must_use]
    pub fn is_zone_selected(&self, zone: ZoneCategory) -> bool {
        self.selected_zones.contains(&zone)
    }

    /// Checked zones in checkbox order.
    #[must_use]
    pub fn selected_zones(&self) -> Vec<ZoneCategory> {
        ZoneCategory::FILTERABLE
            .iter()
            .copied()
            .filter(|zone| self.selected_zones.contains(zone))
            .collect()
    }

    /// Whether every filterable zone is checked.
    #[must_use]
    pub fn all_zones_selected(&self) -> bool {
        self.selected_zones.len() == ZoneCategory::FILTERABLE.len()
    }

    // ── Acreage ─────────────────────────────────────────────────────

    /// Moves the acreage lower bound, snapping it down to the upper bound
    /// if it would cross. Returns the effective value.
    pub fn set_acreage_min(&mut self, value: f64) -> f64 {
        self.acreage_min = self.clamp_acreage(value).min(self.acreage_max);
        self.acreage_min
    }

    /// Moves the acreage upper bound, snapping it up to the lower bound if
    /// it would cross. Returns the effective value.
    pub fn set_acreage_max(&mut self, value: f64) -> f64 {
        self.acreage_max = self.clamp_acreage(value).max(self.acreage_min);
        self.acreage_max
    }

    /// `(min, max)` acreage.
    #[must_use]
    pub const fn acreage_range(&self) -> (f64, f64) {
        (self.acreage_min, self.acreage_max)
    }

    /// Whether the acreage upper bound sits at the sentinel.
    #[must_use]
    pub fn acreage_unbounded(&self) -> bool {
        self.acreage_max >= self.limits.acreage_max
    }

    fn clamp_acreage(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.max(0.0).min(self.limits.acreage_max)
    }

    // ── Market value ────────────────────────────────────────────────

    /// Moves the value lower bound, snapping it down to the upper bound if
    /// it would cross. Returns the effective value.
    pub fn set_value_min(&mut self, value: u64) -> u64 {
        self.value_min = value.min(self.limits.value_max).min(self.value_max);
        self.value_min
    }

    /// Moves the value upper bound, snapping it up to the lower bound if it
    /// would cross. Returns the effective value.
    pub fn set_value_max(&mut self, value: u64) -> u64 {
        self.value_max = value.min(self.limits.value_max).max(self.value_min);
        self.value_max
    }

    /// `(min, max)` market value.
    #[must_use]
    pub const fn value_range(&self) -> (u64, u64) {
        (self.value_min, self.value_max)
    }

    /// Whether the value upper bound sits at the sentinel.
    #[must_use]
    pub const fn value_unbounded(&self) -> bool {
        self.value_max >= self.limits.value_max
    }

    // ── City ────────────────────────────────────────────────────────

    /// Selects a city, or any city with `None` / an empty string.
    pub fn set_city(&mut self, city: Option<String>) {
        self.city = city.filter(|c| !c.is_empty());
    }

    /// The selected city, if any.
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    // ── Labels ──────────────────────────────────────────────────────

    /// Label next to the acreage lower slider.
    #[must_use]
    pub fn acreage_min_label(&self) -> String {
        format::acreage(self.acreage_min)
    }

    /// Label next to the acreage upper slider, e.g. `100+` at the
    /// sentinel.
    #[must_use]
    pub fn acreage_max_label(&self) -> String {
        if self.acreage_unbounded() {
            format!("{}+", format::acreage(self.limits.acreage_max))
        } else {
            format::acreage(self.acreage_max)
        }
    }

    /// Label next to the value lower slider.
    #[must_use]
    pub fn value_min_label(&self) -> String {
        format::abbreviate_currency(self.value_min)
    }

    /// Label next to the value upper slider, e.g. `2M+` at the sentinel.
    #[must_use]
    pub fn value_max_label(&self) -> String {
        if self.value_unbounded() {
            format!("{}+", format::abbreviate_currency(self.limits.value_max))
        } else {
            format::abbreviate_currency(self.value_max)
        }
    }
}
