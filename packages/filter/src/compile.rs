//! Compiles a [`FilterState`] into a parcel predicate.
//!
//! Rule selection lives in exactly one place, [`compile`]. What each rule
//! turns into is decided by an [`OutputMode`]: [`Expression`] builds the
//! declarative filter handed to the renderer, [`Evaluator`] builds a
//! closure-based [`Predicate`] run in-process to count matches. A rule is
//! emitted only when it narrows the parcel set:
//!
//! - zoning, unless every filterable zone is selected
//! - acreage `>=` min, when min > 0
//! - acreage `<=` max, when max is below the sentinel
//! - value `>=` min, when min > 0
//! - value `<=` max, when max is below the sentinel
//! - city `==`, when a city is selected
//!
//! Absent acreage and value count as zero in both modes.

use parcel_map_parcel_models::{ParcelAttributes, ZoneCategory, properties};
use serde_json::{Value, json};

use crate::FilterState;

/// How each rule is represented.
pub trait OutputMode {
    /// One rule.
    type Rule;
    /// The conjunction of all emitted rules.
    type Output;

    /// Zone must be one of `zones`.
    fn zone_in(zones: &[ZoneCategory]) -> Self::Rule;
    /// Acreage (absent = 0) `>= min`.
    fn acreage_at_least(min: f64) -> Self::Rule;
    /// Acreage (absent = 0) `<= max`.
    fn acreage_at_most(max: f64) -> Self::Rule;
    /// Market value (absent = 0) `>= min`.
    fn value_at_least(min: u64) -> Self::Rule;
    /// Market value (absent = 0) `<= max`.
    fn value_at_most(max: u64) -> Self::Rule;
    /// City equals `city` exactly.
    fn city_equals(city: &str) -> Self::Rule;
    /// AND of every rule; an empty list matches everything.
    fn all(rules: Vec<Self::Rule>) -> Self::Output;
}

/// Builds the predicate for `state` in output mode `M`.
///
/// Pure: the same state always yields an equivalent predicate.
pub fn compile<M: OutputMode>(state: &FilterState) -> M::Output {
    let limits = state.limits();
    let mut rules = Vec::new();

    if !state.all_zones_selected() {
        rules.push(M::zone_in(&state.selected_zones()));
    }

    let (acreage_min, acreage_max) = state.acreage_range();
    if acreage_min > 0.0 {
        rules.push(M::acreage_at_least(acreage_min));
    }
    if acreage_max < limits.acreage_max {
        rules.push(M::acreage_at_most(acreage_max));
    }

    let (value_min, value_max) = state.value_range();
    if value_min > 0 {
        rules.push(M::value_at_least(value_min));
    }
    if value_max < limits.value_max {
        rules.push(M::value_at_most(value_max));
    }

    if let Some(city) = state.city() {
        rules.push(M::city_equals(city));
    }

    M::all(rules)
}

// ── Declarative expressions ─────────────────────────────────────────

/// `MapLibre` style-spec filter expressions.
///
/// Output is `None` when no rule is active, which clears the layer
/// filter.
pub struct Expression;

fn get(property: &str) -> Value {
    json!(["get", property])
}

fn coalesce_zero(property: &str) -> Value {
    json!(["coalesce", get(property), 0])
}

impl OutputMode for Expression {
    type Rule = Value;
    type Output = Option<Value>;

    fn zone_in(zones: &[ZoneCategory]) -> Value {
        let names: Vec<&str> = zones.iter().map(AsRef::as_ref).collect();
        json!(["in", get(properties::ZONE_CAT), ["literal", names]])
    }

    fn acreage_at_least(min: f64) -> Value {
        json!([">=", coalesce_zero(properties::GIS_ACRES), min])
    }

    fn acreage_at_most(max: f64) -> Value {
        json!(["<=", coalesce_zero(properties::GIS_ACRES), max])
    }

    fn value_at_least(min: u64) -> Value {
        json!([">=", coalesce_zero(properties::MKTTL), min])
    }

    fn value_at_most(max: u64) -> Value {
        json!(["<=", coalesce_zero(properties::MKTTL), max])
    }

    fn city_equals(city: &str) -> Value {
        json!(["==", get(properties::SITUSCITY), city])
    }

    fn all(rules: Vec<Value>) -> Option<Value> {
        if rules.is_empty() {
            return None;
        }
        let mut expr = vec![json!("all")];
        expr.extend(rules);
        Some(Value::Array(expr))
    }
}

// ── In-process evaluation ───────────────────────────────────────────

type Rule = Box<dyn Fn(&ParcelAttributes) -> bool + Send + Sync>;

/// In-process evaluation of the same rules.
pub struct Evaluator;

impl OutputMode for Evaluator {
    type Rule = Rule;
    type Output = Predicate;

    fn zone_in(zones: &[ZoneCategory]) -> Rule {
        let zones = zones.to_vec();
        Box::new(move |p| p.zone.is_some_and(|zone| zones.contains(&zone)))
    }

    fn acreage_at_least(min: f64) -> Rule {
        Box::new(move |p| p.acres_or_zero() >= min)
    }

    fn acreage_at_most(max: f64) -> Rule {
        Box::new(move |p| p.acres_or_zero() <= max)
    }

    fn value_at_least(min: u64) -> Rule {
        Box::new(move |p| p.market_value_or_zero() >= min)
    }

    fn value_at_most(max: u64) -> Rule {
        Box::new(move |p| p.market_value_or_zero() <= max)
    }

    fn city_equals(city: &str) -> Rule {
        let city = city.to_string();
        Box::new(move |p| p.city.as_deref() == Some(city.as_str()))
    }

    fn all(rules: Vec<Rule>) -> Predicate {
        Predicate { rules }
    }
}

/// A conjunction of in-process rules.
pub struct Predicate {
    rules: Vec<Rule>,
}

impl Predicate {
    /// Whether a parcel satisfies every rule.
    #[must_use]
    pub fn matches(&self, parcel: &ParcelAttributes) -> bool {
        self.rules.iter().all(|rule| rule(parcel))
    }

    /// Number of parcels satisfying every rule.
    pub fn count<'a>(&self, parcels: impl IntoIterator<Item = &'a ParcelAttributes>) -> usize {
        parcels.into_iter().filter(|p| self.matches(p)).count()
    }

    /// Number of active rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule is active (every parcel matches).
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Both representations of one filter state.
#[derive(Debug)]
pub struct CompiledFilter {
    /// Declarative filter for the renderer; `None` clears the filter.
    pub expression: Option<Value>,
    /// In-process predicate for counting.
    pub predicate: Predicate,
}

impl CompiledFilter {
    /// Compiles `state` in both output modes.
    #[must_use]
    pub fn new(state: &FilterState) -> Self {
        Self {
            expression: compile::<Expression>(state),
            predicate: compile::<Evaluator>(state),
        }
    }
}
