//! In-memory rendering collaborator and sidebar.
//!
//! [`HeadlessMap`] keeps sources, layers, filters, and feature state the
//! way a real renderer would, evaluates layer filters with
//! [`crate::expression`], and hit-tests polygon sources through an R-tree.

use std::collections::BTreeMap;

use geojson::{FeatureCollection, JsonObject, feature::Id};
use parcel_map_filter::FilterState;
use parcel_map_parcel_models::ParcelId;
use parcel_map_search::Status;
use parcel_map_store::spatial::OutlineIndex;
use serde_json::Value;

use crate::expression::{self, Context};
use crate::layers::{BasemapStyle, LayerSpec, Overlay};
use crate::popup::Popup;
use crate::renderer::{
    Cursor, FeatureFlag, FitBounds, FlyTo, MapRenderer, RangeControl, RenderedFeature, Sidebar,
};

/// Default hit radius around point features, in degrees.
pub const DEFAULT_POINT_TOLERANCE: f64 = 0.000_5;

struct HeadlessSource {
    data: FeatureCollection,
    outlines: OutlineIndex,
}

/// A layer as the headless renderer holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessLayer {
    /// The spec it was added with, with later property changes applied.
    pub spec: LayerSpec,
    /// Current declarative filter.
    pub filter: Option<Value>,
}

impl HeadlessLayer {
    /// Whether the `visibility` layout property is anything but `none`.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.spec.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }
}

/// The last camera animation requested.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraMove {
    /// Centre on a position.
    FlyTo(FlyTo),
    /// Frame a region.
    FitBounds(FitBounds),
}

/// A renderer that renders nothing but remembers everything.
pub struct HeadlessMap {
    style: Option<BasemapStyle>,
    sources: BTreeMap<String, HeadlessSource>,
    layers: Vec<HeadlessLayer>,
    feature_state: BTreeMap<(String, ParcelId), JsonObject>,
    popups: Vec<Popup>,
    pending_popups: Vec<Popup>,
    cursor: Cursor,
    camera: Option<CameraMove>,
    calls: Vec<String>,
    point_tolerance: f64,
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMap {
    /// An empty map with no style loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            style: None,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            feature_state: BTreeMap::new(),
            popups: Vec::new(),
            pending_popups: Vec::new(),
            cursor: Cursor::Default,
            camera: None,
            calls: Vec::new(),
            point_tolerance: DEFAULT_POINT_TOLERANCE,
        }
    }

    /// Sets the hit radius around point features, in degrees.
    #[must_use]
    pub const fn with_point_tolerance(mut self, degrees: f64) -> Self {
        self.point_tolerance = degrees;
        self
    }

    /// Every mutating call, as `"<method> <id>"`, in order.
    #[must_use]
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// The loaded style.
    #[must_use]
    pub const fn style(&self) -> Option<&BasemapStyle> {
        self.style.as_ref()
    }

    /// Layer ids bottom first.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.spec.id.as_str()).collect()
    }

    /// A layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&HeadlessLayer> {
        self.layers.iter().find(|l| l.spec.id == id)
    }

    /// Whether a layer exists and is visible.
    #[must_use]
    pub fn is_visible(&self, id: &str) -> bool {
        self.layer(id).is_some_and(HeadlessLayer::is_visible)
    }

    /// Whether a source exists.
    #[must_use]
    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Number of features in the layer's source admitted by its filter:
    /// what the layer would draw with the whole source in view.
    #[must_use]
    pub fn displayed_count(&self, layer: &str) -> usize {
        self.displayed_ids(layer).len()
    }

    /// Ids of the features the layer would draw, in source order.
    #[must_use]
    pub fn displayed_ids(&self, layer: &str) -> Vec<u64> {
        let Some(layer) = self.layer(layer) else {
            return Vec::new();
        };
        let Some(source) = self.sources.get(&layer.spec.source) else {
            return Vec::new();
        };
        source
            .data
            .features
            .iter()
            .filter(|f| expression::passes(layer.filter.as_ref(), properties(f)))
            .filter_map(|f| feature_id(f.id.as_ref()))
            .collect()
    }

    /// A transient flag on one parcel.
    #[must_use]
    pub fn flag(&self, source: &str, id: ParcelId, flag: FeatureFlag) -> bool {
        self.feature_state
            .get(&(source.to_string(), id))
            .and_then(|state| state.get(flag.as_ref()))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Every parcel in `source` with `flag` set.
    #[must_use]
    pub fn flagged(&self, source: &str, flag: FeatureFlag) -> Vec<ParcelId> {
        self.feature_state
            .iter()
            .filter(|((s, _), state)| {
                s == source && state.get(flag.as_ref()).and_then(Value::as_bool) == Some(true)
            })
            .map(|((_, id), _)| *id)
            .collect()
    }

    /// Evaluates a layer paint property for one parcel, applying its
    /// feature state.
    #[must_use]
    pub fn paint_value(&self, layer: &str, property: &str, id: ParcelId) -> Option<Value> {
        let layer = self.layer(layer)?;
        let expr = layer.spec.paint.get(property)?;
        let source = self.sources.get(&layer.spec.source)?;
        let feature = source
            .data
            .features
            .iter()
            .find(|f| feature_id(f.id.as_ref()) == Some(id.0))?;
        let state = self.feature_state.get(&(layer.spec.source.clone(), id));
        Some(expression::evaluate(
            expr,
            Context {
                properties: properties(feature),
                state,
            },
        ))
    }

    /// Popups currently open.
    #[must_use]
    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    /// Popups waiting for the camera to stop.
    #[must_use]
    pub fn pending_popups(&self) -> &[Popup] {
        &self.pending_popups
    }

    /// Finishes the camera animation, opening any waiting popups.
    pub fn settle_camera(&mut self) {
        self.popups.append(&mut self.pending_popups);
    }

    /// The current cursor.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The last camera animation requested.
    #[must_use]
    pub const fn camera(&self) -> Option<&CameraMove> {
        self.camera.as_ref()
    }

    fn record(&mut self, method: &str, id: &str) {
        self.calls.push(format!("{method} {id}"));
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut HeadlessLayer> {
        self.layers.iter_mut().find(|l| l.spec.id == id)
    }

    fn hits(&self, layer: &HeadlessLayer, position: [f64; 2]) -> Vec<RenderedFeature> {
        let Some(source) = self.sources.get(&layer.spec.source) else {
            return Vec::new();
        };
        let [lng, lat] = position;

        let mut indices = source.outlines.lookup(lng, lat);
        indices.extend(
            source
                .data
                .features
                .iter()
                .enumerate()
                .filter(|(_, f)| {
                    point_of(f).is_some_and(|[x, y]| {
                        (x - lng).abs() <= self.point_tolerance
                            && (y - lat).abs() <= self.point_tolerance
                    })
                })
                .map(|(i, _)| i),
        );

        indices
            .into_iter()
            .filter_map(|i| source.data.features.get(i))
            .filter(|f| expression::passes(layer.filter.as_ref(), properties(f)))
            .map(|f| RenderedFeature {
                layer: layer.spec.id.clone(),
                id: feature_id(f.id.as_ref()),
                properties: properties(f).clone(),
            })
            .collect()
    }
}

fn empty_properties() -> &'static JsonObject {
    static EMPTY: std::sync::OnceLock<JsonObject> = std::sync::OnceLock::new();
    EMPTY.get_or_init(JsonObject::new)
}

fn properties(feature: &geojson::Feature) -> &JsonObject {
    feature.properties.as_ref().unwrap_or_else(|| empty_properties())
}

fn feature_id(id: Option<&Id>) -> Option<u64> {
    match id? {
        Id::Number(n) => n.as_u64(),
        Id::String(s) => s.parse().ok(),
    }
}

fn point_of(feature: &geojson::Feature) -> Option<[f64; 2]> {
    match &feature.geometry.as_ref()?.value {
        geojson::Value::Point(p) => match p.as_slice() {
            [x, y, ..] => Some([*x, *y]),
            _ => None,
        },
        _ => None,
    }
}

impl MapRenderer for HeadlessMap {
    fn set_style(&mut self, style: &BasemapStyle) {
        self.record("set_style", "");
        self.style = Some(style.clone());
        self.sources.clear();
        self.layers.clear();
        self.feature_state.clear();
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) {
        self.record("add_source", id);
        let outlines = OutlineIndex::build(data.features.iter().map(|f| f.geometry.as_ref()));
        self.sources
            .insert(id.to_string(), HeadlessSource { data, outlines });
    }

    fn remove_source(&mut self, id: &str) {
        self.record("remove_source", id);
        self.sources.remove(id);
        self.feature_state.retain(|(source, _), _| source != id);
    }

    fn add_layer(&mut self, layer: &LayerSpec) {
        self.record("add_layer", &layer.id);
        self.layers.push(HeadlessLayer {
            spec: layer.clone(),
            filter: None,
        });
    }

    fn remove_layer(&mut self, id: &str) {
        self.record("remove_layer", id);
        self.layers.retain(|l| l.spec.id != id);
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn move_layer_to_top(&mut self, id: &str) {
        self.record("move_layer", id);
        if let Some(index) = self.layers.iter().position(|l| l.spec.id == id) {
            let layer = self.layers.remove(index);
            self.layers.push(layer);
        }
    }

    fn set_layout_property(&mut self, layer: &str, name: &str, value: Value) {
        self.record("set_layout_property", layer);
        if let Some(layer) = self.layer_mut(layer) {
            layer.spec.layout.insert(name.to_string(), value);
        }
    }

    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value) {
        self.record("set_paint_property", layer);
        if let Some(layer) = self.layer_mut(layer) {
            layer.spec.paint.insert(name.to_string(), value);
        }
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) {
        self.record("set_filter", layer);
        if let Some(layer) = self.layer_mut(layer) {
            layer.filter = filter.cloned();
        }
    }

    fn set_feature_state(&mut self, source: &str, id: ParcelId, flag: FeatureFlag, value: bool) {
        self.feature_state
            .entry((source.to_string(), id))
            .or_default()
            .insert(flag.as_ref().to_string(), Value::Bool(value));
    }

    fn query_rendered_features(
        &self,
        position: [f64; 2],
        layers: &[&str],
    ) -> Vec<RenderedFeature> {
        self.layers
            .iter()
            .rev()
            .filter(|l| layers.contains(&l.spec.id.as_str()) && l.is_visible())
            .flat_map(|l| self.hits(l, position))
            .collect()
    }

    fn fly_to(&mut self, camera: &FlyTo) {
        self.record("fly_to", "");
        self.camera = Some(CameraMove::FlyTo(camera.clone()));
    }

    fn fit_bounds(&mut self, camera: &FitBounds) {
        self.record("fit_bounds", "");
        self.camera = Some(CameraMove::FitBounds(camera.clone()));
    }

    fn show_popup(&mut self, popup: &Popup) {
        self.record("show_popup", &popup.title);
        self.popups.push(popup.clone());
    }

    fn show_popup_after_move(&mut self, popup: &Popup) {
        self.record("show_popup_after_move", &popup.title);
        self.pending_popups.push(popup.clone());
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}

/// A sidebar that keeps the last value pushed to each element.
#[derive(Debug, Clone, Default)]
pub struct RecordingSidebar {
    /// Match count text.
    pub count_text: Option<String>,
    /// Search status line.
    pub status: Option<Status>,
    /// Slider labels.
    pub range_labels: BTreeMap<RangeControl, String>,
    /// Controls as last synchronized with a filter state.
    pub filter_state: Option<FilterState>,
    /// City selector options.
    pub city_options: Vec<String>,
    /// How many times the city options were pushed.
    pub city_option_pushes: usize,
    /// Overlay checkbox states.
    pub overlays: Vec<(Overlay, bool)>,
    /// Income legend visibility.
    pub legend_visible: bool,
    /// Basemap button text.
    pub basemap_button: Option<String>,
    /// Whether the loading overlay was hidden.
    pub loading_hidden: bool,
    /// Error shown in place of the loading overlay.
    pub load_error: Option<String>,
}

impl RecordingSidebar {
    /// Last label pushed for a slider.
    #[must_use]
    pub fn range_label(&self, control: RangeControl) -> Option<&str> {
        self.range_labels.get(&control).map(String::as_str)
    }

    /// Last checkbox state pushed for an overlay.
    #[must_use]
    pub fn overlay_checked(&self, overlay: Overlay) -> Option<bool> {
        self.overlays
            .iter()
            .find(|(o, _)| *o == overlay)
            .map(|(_, checked)| *checked)
    }
}

impl Sidebar for RecordingSidebar {
    fn set_count_text(&mut self, text: &str) {
        self.count_text = Some(text.to_string());
    }

    fn set_status(&mut self, status: &Status) {
        self.status = Some(status.clone());
    }

    fn set_range_label(&mut self, control: RangeControl, text: &str) {
        self.range_labels.insert(control, text.to_string());
    }

    fn show_filter_state(&mut self, state: &FilterState) {
        self.filter_state = Some(state.clone());
    }

    fn set_city_options(&mut self, cities: &[String]) {
        self.city_options = cities.to_vec();
        self.city_option_pushes += 1;
    }

    fn set_overlay_checked(&mut self, overlay: Overlay, checked: bool) {
        match self.overlays.iter_mut().find(|(o, _)| *o == overlay) {
            Some(entry) => entry.1 = checked,
            None => self.overlays.push((overlay, checked)),
        }
    }

    fn set_legend_visible(&mut self, visible: bool) {
        self.legend_visible = visible;
    }

    fn set_basemap_button(&mut self, label: &str) {
        self.basemap_button = Some(label.to_string());
    }

    fn hide_loading(&mut self) {
        self.loading_hidden = true;
    }

    fn show_load_error(&mut self, message: &str) {
        self.load_error = Some(message.to_string());
    }
}
