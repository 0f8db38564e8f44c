//! The view controller.
//!
//! A [`Session`] owns everything that changes while the map is open: the
//! loaded store, the filter state, the basemap, overlay toggles, the
//! hovered parcel, and the last search highlight. It reconciles that state
//! onto a [`MapRenderer`] and a [`Sidebar`].
//!
//! Lifecycle: `Uninitialized -> Loading -> Ready`, or `Loading -> Error`
//! when a required collection fails to load. User actions are accepted
//! only in `Ready`; anything earlier (or after an error) is ignored.

use geojson::JsonObject;
use parcel_map_filter::{CompiledFilter, FilterState, format};
use parcel_map_parcel_models::{
    IncomeTractAttributes, ParcelAttributes, ParcelId, PointOfInterestAttributes, ZoneCategory,
};
use parcel_map_search::{Query, SearchResult};
use parcel_map_store::pipeline::LoadPipeline;
use parcel_map_store::{FeatureStore, LoadError};

use crate::config::ViewerConfig;
use crate::layers::{
    self, Basemap, FILTERED_LAYERS, INCOME_FILL, INCOME_SOURCE, Overlay, PARCEL_FILL,
    PARCEL_SOURCE, POI_CIRCLE, POI_LAYERS, POI_SOURCE,
};
use crate::popup::Popup;
use crate::renderer::{Cursor, FeatureFlag, FitBounds, FlyTo, MapRenderer, RangeControl, Sidebar};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing requested yet.
    Uninitialized,
    /// Collections are being fetched.
    Loading,
    /// Data is on the map and user actions are accepted.
    Ready,
    /// A required collection failed to load. Terminal.
    Error(String),
}

#[derive(Debug, Clone)]
struct OverlayToggles {
    points_of_interest: bool,
    income_tracts: bool,
    buffers: Vec<(f64, bool)>,
}

impl OverlayToggles {
    fn new(radii_miles: &[f64]) -> Self {
        Self {
            points_of_interest: true,
            income_tracts: false,
            buffers: radii_miles.iter().map(|r| (*r, false)).collect(),
        }
    }

    fn get(&self, overlay: Overlay) -> Option<bool> {
        match overlay {
            Overlay::PointsOfInterest => Some(self.points_of_interest),
            Overlay::IncomeTracts => Some(self.income_tracts),
            Overlay::BufferRings(radius) => self
                .buffers
                .iter()
                .find(|(r, _)| same_radius(*r, radius))
                .map(|(_, on)| *on),
        }
    }

    fn set(&mut self, overlay: Overlay, visible: bool) -> bool {
        match overlay {
            Overlay::PointsOfInterest => self.points_of_interest = visible,
            Overlay::IncomeTracts => self.income_tracts = visible,
            Overlay::BufferRings(radius) => {
                let Some(entry) = self.buffers.iter_mut().find(|(r, _)| same_radius(*r, radius))
                else {
                    return false;
                };
                entry.1 = visible;
            }
        }
        true
    }

    fn all(&self) -> Vec<(Overlay, bool)> {
        let mut all = vec![
            (Overlay::PointsOfInterest, self.points_of_interest),
            (Overlay::IncomeTracts, self.income_tracts),
        ];
        all.extend(
            self.buffers
                .iter()
                .map(|(r, on)| (Overlay::BufferRings(*r), *on)),
        );
        all
    }
}

fn same_radius(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}

/// One open map.
pub struct Session<R: MapRenderer, S: Sidebar> {
    config: ViewerConfig,
    renderer: R,
    sidebar: S,
    state: SessionState,
    store: Option<FeatureStore>,
    filter: FilterState,
    basemap: Basemap,
    overlays: OverlayToggles,
    hovered: Option<ParcelId>,
    searched: Vec<ParcelId>,
    match_count: Option<usize>,
}

impl<R: MapRenderer, S: Sidebar> Session<R, S> {
    /// A session that has not started loading.
    #[must_use]
    pub fn new(config: ViewerConfig, renderer: R, sidebar: S) -> Self {
        let filter = FilterState::new(config.filter);
        let overlays = OverlayToggles::new(&config.buffers.radii_miles);
        Self {
            config,
            renderer,
            sidebar,
            state: SessionState::Uninitialized,
            store: None,
            filter,
            basemap: Basemap::default(),
            overlays,
            hovered: None,
            searched: Vec::new(),
            match_count: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    #[must_use]
    pub const fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the renderer, e.g. to let a camera animation
    /// finish.
    pub const fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[must_use]
    pub const fn sidebar(&self) -> &S {
        &self.sidebar
    }

    #[must_use]
    pub const fn store(&self) -> Option<&FeatureStore> {
        self.store.as_ref()
    }

    #[must_use]
    pub const fn filter(&self) -> &FilterState {
        &self.filter
    }

    #[must_use]
    pub const fn basemap(&self) -> Basemap {
        self.basemap
    }

    /// The parcel currently flagged as hovered.
    #[must_use]
    pub const fn hovered(&self) -> Option<ParcelId> {
        self.hovered
    }

    /// Parcels matching the current filter, once loaded.
    #[must_use]
    pub const fn match_count(&self) -> Option<usize> {
        self.match_count
    }

    /// Whether an overlay toggle is on. `None` for an unconfigured buffer
    /// radius.
    #[must_use]
    pub fn overlay_visible(&self, overlay: Overlay) -> Option<bool> {
        self.overlays.get(overlay)
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// The standard load pipeline for this session's configuration.
    #[must_use]
    pub fn pipeline(&self, client: reqwest::Client) -> LoadPipeline {
        let data = &self.config.data;
        LoadPipeline::standard(
            client,
            data.parcels.clone(),
            data.points_of_interest.clone(),
            data.income_tracts.clone(),
        )
        .with_buffer_radii(self.config.buffers.radii_miles.clone())
    }

    /// Runs `pipeline` and moves to `Ready` or `Error`.
    pub async fn load(&mut self, pipeline: &LoadPipeline) {
        if !self.begin_loading() {
            return;
        }
        let result = pipeline.run().await;
        self.finish_loading(result);
    }

    /// Moves `Uninitialized -> Loading`. Returns `false` (and does
    /// nothing) from any other state.
    pub fn begin_loading(&mut self) -> bool {
        if self.state != SessionState::Uninitialized {
            log::warn!("Ignoring load request in state {:?}", self.state);
            return false;
        }
        self.state = SessionState::Loading;
        true
    }

    /// Completes a load started with [`Self::begin_loading`].
    pub fn finish_loading(&mut self, result: Result<FeatureStore, LoadError>) {
        if self.state != SessionState::Loading {
            log::warn!("Ignoring load result in state {:?}", self.state);
            return;
        }

        let store = match result {
            Ok(store) => store,
            Err(e) => {
                log::error!("{e}");
                let message = e.to_string();
                self.sidebar.show_load_error(&format!("Error: {message}"));
                self.state = SessionState::Error(message);
                return;
            }
        };

        self.sidebar.set_city_options(&store.cities());
        self.store = Some(store);
        self.install_layers();
        self.sidebar.set_basemap_button(self.basemap.button_label());
        self.sidebar.hide_loading();
        self.state = SessionState::Ready;
        self.apply_filters();
    }

    // ── Filters ─────────────────────────────────────────────────────

    /// Checks or unchecks a zoning category.
    pub fn set_zone(&mut self, zone: ZoneCategory, selected: bool) {
        if self.is_ready() {
            self.filter.set_zone(zone, selected);
            self.apply_filters();
        }
    }

    /// Replaces the zoning selection.
    pub fn select_only_zones(&mut self, zones: impl IntoIterator<Item = ZoneCategory>) {
        if self.is_ready() {
            self.filter.select_only(zones);
            self.apply_filters();
        }
    }

    pub fn set_acreage_min(&mut self, value: f64) {
        if self.is_ready() {
            self.filter.set_acreage_min(value);
            self.sidebar
                .set_range_label(RangeControl::AcreageMin, &self.filter.acreage_min_label());
            self.apply_filters();
        }
    }

    pub fn set_acreage_max(&mut self, value: f64) {
        if self.is_ready() {
            self.filter.set_acreage_max(value);
            self.sidebar
                .set_range_label(RangeControl::AcreageMax, &self.filter.acreage_max_label());
            self.apply_filters();
        }
    }

    pub fn set_value_min(&mut self, value: u64) {
        if self.is_ready() {
            self.filter.set_value_min(value);
            self.sidebar
                .set_range_label(RangeControl::ValueMin, &self.filter.value_min_label());
            self.apply_filters();
        }
    }

    pub fn set_value_max(&mut self, value: u64) {
        if self.is_ready() {
            self.filter.set_value_max(value);
            self.sidebar
                .set_range_label(RangeControl::ValueMax, &self.filter.value_max_label());
            self.apply_filters();
        }
    }

    /// Selects a city, or any city with `None`.
    pub fn set_city(&mut self, city: Option<String>) {
        if self.is_ready() {
            self.filter.set_city(city);
            self.apply_filters();
        }
    }

    /// Restores the initial filter and turns off the buffer and income
    /// overlays.
    pub fn reset_filters(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.filter.reset();
        self.sidebar.show_filter_state(&self.filter);
        self.push_range_labels();

        let mut off = vec![Overlay::IncomeTracts];
        off.extend(
            self.overlays
                .buffers
                .iter()
                .map(|(r, _)| Overlay::BufferRings(*r)),
        );
        for overlay in off {
            self.apply_overlay(overlay, false);
        }

        self.apply_filters();
    }

    fn push_range_labels(&mut self) {
        let labels = [
            (RangeControl::AcreageMin, self.filter.acreage_min_label()),
            (RangeControl::AcreageMax, self.filter.acreage_max_label()),
            (RangeControl::ValueMin, self.filter.value_min_label()),
            (RangeControl::ValueMax, self.filter.value_max_label()),
        ];
        for (control, label) in labels {
            self.sidebar.set_range_label(control, &label);
        }
    }

    /// Recompiles the filter, pushes it to the parcel layers, and
    /// recounts.
    fn apply_filters(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        let compiled = CompiledFilter::new(&self.filter);
        for layer in FILTERED_LAYERS {
            self.renderer.set_filter(layer, compiled.expression.as_ref());
        }

        let count = compiled
            .predicate
            .count(store.parcels().iter().map(|p| &p.attributes));
        log::debug!(
            "Filter with {} rules matches {count} of {} parcels",
            compiled.predicate.rule_count(),
            store.parcels().len()
        );
        self.sidebar.set_count_text(&format::parcel_count(count));
        self.match_count = Some(count);
    }

    // ── Overlays ────────────────────────────────────────────────────

    /// Shows or hides an overlay. Never affects the parcel filter.
    pub fn set_overlay(&mut self, overlay: Overlay, visible: bool) {
        if self.is_ready() {
            self.apply_overlay(overlay, visible);
        }
    }

    fn apply_overlay(&mut self, overlay: Overlay, visible: bool) {
        if !self.overlays.set(overlay, visible) {
            log::warn!("No overlay configured for {overlay:?}");
            return;
        }
        self.push_visibility(overlay, visible);
        self.sidebar.set_overlay_checked(overlay, visible);
        if overlay == Overlay::IncomeTracts {
            self.sidebar.set_legend_visible(visible);
        }
    }

    fn push_visibility(&mut self, overlay: Overlay, visible: bool) {
        for layer in overlay.layer_ids() {
            if self.renderer.has_layer(&layer) {
                self.renderer
                    .set_layout_property(&layer, "visibility", layers::visibility(visible));
            }
        }
    }

    // ── Basemap ─────────────────────────────────────────────────────

    /// Switches to the other basemap.
    pub fn toggle_basemap(&mut self) {
        self.set_basemap(self.basemap.toggled());
    }

    /// Swaps the basemap style, re-creating every data source and layer
    /// and reapplying filters, overlay visibility, and search highlight.
    pub fn set_basemap(&mut self, basemap: Basemap) {
        if !self.is_ready() || basemap == self.basemap {
            return;
        }
        log::debug!("Switching basemap {} -> {basemap}", self.basemap);

        self.teardown_layers();
        self.basemap = basemap;
        self.renderer.set_style(&basemap.style());
        self.hovered = None;
        self.install_layers();
        self.apply_filters();
        for id in self.searched.clone() {
            self.renderer
                .set_feature_state(PARCEL_SOURCE, id, FeatureFlag::Searched, true);
        }
        self.sidebar.set_basemap_button(basemap.button_label());
    }

    fn buffer_radii(&self) -> Vec<f64> {
        self.store
            .as_ref()
            .map(|store| store.buffer_rings().iter().map(|r| r.radius_miles).collect())
            .unwrap_or_default()
    }

    fn data_layers(&self) -> Vec<layers::LayerSpec> {
        let mut all = Vec::new();
        if self.store.as_ref().is_some_and(|s| s.income_tracts().is_some()) {
            all.extend(layers::income_layers(self.basemap));
        }
        all.extend(layers::buffer_layers(&self.buffer_radii()));
        all.extend(layers::parcel_layers(self.basemap));
        all.extend(layers::poi_layers(self.basemap));
        all
    }

    fn teardown_layers(&mut self) {
        for layer in self.data_layers().iter().rev() {
            if self.renderer.has_layer(&layer.id) {
                self.renderer.remove_layer(&layer.id);
            }
        }
        let mut sources = vec![
            POI_SOURCE.to_string(),
            PARCEL_SOURCE.to_string(),
            INCOME_SOURCE.to_string(),
        ];
        sources.extend(self.buffer_radii().into_iter().map(layers::buffer_source));
        for source in sources {
            self.renderer.remove_source(&source);
        }
    }

    fn install_layers(&mut self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Some(income) = store.income_geojson() {
            self.renderer.add_source(INCOME_SOURCE, income);
        }
        for rings in store.buffer_rings() {
            self.renderer
                .add_source(&layers::buffer_source(rings.radius_miles), rings.collection.clone());
        }
        self.renderer.add_source(PARCEL_SOURCE, store.parcels_geojson());
        self.renderer
            .add_source(POI_SOURCE, store.points_of_interest_geojson());

        for layer in self.data_layers() {
            self.renderer.add_layer(&layer);
        }
        for layer in POI_LAYERS {
            self.renderer.move_layer_to_top(layer);
        }

        for (overlay, visible) in self.overlays.all() {
            self.push_visibility(overlay, visible);
        }
    }

    // ── Pointer ─────────────────────────────────────────────────────

    /// Pointer moved to `position`: updates hover and cursor.
    pub fn pointer_move(&mut self, position: [f64; 2]) {
        if !self.is_ready() {
            return;
        }
        let parcel = self
            .renderer
            .query_rendered_features(position, &[PARCEL_FILL])
            .into_iter()
            .find_map(|f| f.id)
            .map(ParcelId);

        match parcel {
            Some(id) => {
                self.set_hovered(Some(id));
                self.renderer.set_cursor(Cursor::Pointer);
            }
            None => {
                self.set_hovered(None);
                let over_poi = !self
                    .renderer
                    .query_rendered_features(position, &[POI_CIRCLE])
                    .is_empty();
                self.renderer.set_cursor(if over_poi {
                    Cursor::Pointer
                } else {
                    Cursor::Default
                });
            }
        }
    }

    /// Pointer left the map.
    pub fn pointer_leave(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.set_hovered(None);
        self.renderer.set_cursor(Cursor::Default);
    }

    fn set_hovered(&mut self, id: Option<ParcelId>) {
        if self.hovered == id {
            return;
        }
        if let Some(previous) = self.hovered.take() {
            self.renderer
                .set_feature_state(PARCEL_SOURCE, previous, FeatureFlag::Hover, false);
        }
        if let Some(id) = id {
            self.renderer
                .set_feature_state(PARCEL_SOURCE, id, FeatureFlag::Hover, true);
        }
        self.hovered = id;
    }

    /// Click at `position`: opens a popup for the topmost point of
    /// interest, else parcel, else income tract under the pointer.
    pub fn click(&mut self, position: [f64; 2]) {
        if !self.is_ready() {
            return;
        }
        if let Some(popup) = self.popup_at(position) {
            self.renderer.show_popup(&popup);
        }
    }

    fn popup_at(&self, position: [f64; 2]) -> Option<Popup> {
        if let Some(poi) = self
            .renderer
            .query_rendered_features(position, &[POI_CIRCLE])
            .into_iter()
            .next()
        {
            let attributes: PointOfInterestAttributes = from_properties(poi.properties);
            return Some(Popup::point_of_interest(position, &attributes));
        }

        if let Some(parcel) = self
            .renderer
            .query_rendered_features(position, &[PARCEL_FILL])
            .into_iter()
            .next()
        {
            let attributes = parcel
                .id
                .and_then(|id| self.store.as_ref()?.parcel(ParcelId(id)))
                .map_or_else(
                    || from_properties::<ParcelAttributes>(parcel.properties),
                    |p| p.attributes.clone(),
                );
            return Some(Popup::parcel(position, &attributes));
        }

        self.renderer
            .query_rendered_features(position, &[INCOME_FILL])
            .into_iter()
            .next()
            .map(|tract| {
                let attributes: IncomeTractAttributes = from_properties(tract.properties);
                Popup::income_tract(position, &attributes)
            })
    }

    // ── Search ──────────────────────────────────────────────────────

    /// Runs a free-text search. Blank queries change nothing.
    pub fn search(&mut self, raw: &str) {
        if !self.is_ready() {
            return;
        }
        let Some(query) = Query::parse(raw) else {
            return;
        };
        let Some(store) = &self.store else {
            return;
        };

        let result = parcel_map_search::search(store, &query);
        self.sidebar.set_status(&result.status());

        for (id, searched) in result.searched_flags(store) {
            self.renderer
                .set_feature_state(PARCEL_SOURCE, id, FeatureFlag::Searched, searched);
        }

        let camera = &self.config.camera;
        match &result {
            SearchResult::NoMatch => self.searched.clear(),
            SearchResult::PointOfInterest(poi) => {
                self.searched.clear();
                self.renderer.fly_to(&FlyTo {
                    center: poi.coordinate,
                    zoom: camera.poi_zoom,
                    duration_ms: camera.fly_duration_ms,
                });
                self.renderer.show_popup_after_move(&Popup::search_hit(
                    poi.coordinate,
                    &poi.name,
                    poi.category.as_deref(),
                ));
            }
            SearchResult::Parcels(matches) => {
                self.searched.clone_from(&matches.ids);
                if let Some(bounds) = matches.bounds {
                    self.renderer.fit_bounds(&FitBounds {
                        bounds,
                        padding: camera.fit_padding,
                        max_zoom: camera.fit_max_zoom,
                        duration_ms: camera.fly_duration_ms,
                    });
                }
            }
        }
    }
}

fn from_properties<T: serde::de::DeserializeOwned + Default>(properties: JsonObject) -> T {
    serde_json::from_value(serde_json::Value::Object(properties)).unwrap_or_else(|e| {
        log::debug!("Unreadable feature properties: {e}");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{CameraMove, HeadlessMap, RecordingSidebar};
    use crate::layers::{PARCEL_OUTLINE, POI_LABEL};
    use geojson::FeatureCollection;
    use parcel_map_filter::{Evaluator, compile};
    use parcel_map_search::StatusStyle;
    use parcel_map_store::pipeline::StageKind;
    use parcel_map_store::source::parse_feature_collection;
    use parcel_map_store::StoreError;
    use serde_json::{Value, json};

    type TestSession = Session<HeadlessMap, RecordingSidebar>;

    fn square(west: f64, south: f64, size: f64) -> Value {
        json!({"type": "Polygon", "coordinates": [[
            [west, south], [west + size, south], [west + size, south + size],
            [west, south + size], [west, south]
        ]]})
    }

    fn collection(value: &Value) -> FeatureCollection {
        parse_feature_collection(value.to_string().as_bytes()).unwrap()
    }

    fn fixture_store() -> FeatureStore {
        let parcels = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": square(0.0, 0.0, 0.5), "properties": {
                "PARCEL_ID": "A1", "ZONE_CAT": "Industrial", "GIS_ACRES": 5.0, "MKTTL": 300_000,
                "SITUSCITY": "EVERETT", "SITUSLINE1": "100 MAIN ST"}},
            {"type": "Feature", "geometry": square(1.0, 0.0, 0.5), "properties": {
                "PARCEL_ID": "B2", "ZONE_CAT": "Trade", "GIS_ACRES": 1.0, "MKTTL": 1_500_000,
                "SITUSCITY": "MONROE", "SITUSLINE1": "200 MAIN ST"}},
            {"type": "Feature", "geometry": square(2.0, 0.0, 0.5), "properties": {
                "PARCEL_ID": "C3", "ZONE_CAT": "Residential", "GIS_ACRES": null, "MKTTL": null,
                "SITUSCITY": "EVERETT", "SITUSLINE1": "9 OAK AVE"}},
            {"type": "Feature", "geometry": square(3.0, 0.0, 0.5), "properties": {
                "PARCEL_ID": "D4", "ZONE_CAT": "Services", "GIS_ACRES": 150.0, "MKTTL": 5_000_000,
                "SITUSCITY": ""}}
        ]});
        let gyms = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.0, 10.0]},
             "properties": {"name": "Iron Works Gym", "category": "Gym", "phone": "555-0100"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [11.0, 10.0]},
             "properties": {"name": "Oak Fitness", "category": "Fitness"}}
        ]});
        let income = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": square(-1.0, -1.0, 7.0), "properties": {
                "GEOID": "53061040100", "tract_name": "Census Tract 401",
                "median_income": 81_000, "income_bracket": "high"}}
        ]});
        FeatureStore::from_collections(
            collection(&parcels),
            collection(&gyms),
            Some(collection(&income)),
            &[3.0, 5.0],
        )
        .unwrap()
    }

    fn session() -> TestSession {
        Session::new(
            ViewerConfig::embedded().unwrap(),
            HeadlessMap::new(),
            RecordingSidebar::default(),
        )
    }

    fn ready(store: FeatureStore) -> TestSession {
        let mut session = session();
        assert!(session.begin_loading());
        session.finish_loading(Ok(store));
        assert_eq!(session.state(), &SessionState::Ready);
        session
    }

    fn assert_agreement(session: &TestSession) {
        let store = session.store().unwrap();
        let predicate = compile::<Evaluator>(session.filter());
        let expected: Vec<u64> = store
            .parcels()
            .iter()
            .filter(|p| predicate.matches(&p.attributes))
            .map(|p| p.id.0)
            .collect();
        for layer in FILTERED_LAYERS {
            assert_eq!(
                session.renderer().displayed_ids(layer),
                expected,
                "{layer} disagrees with the in-process predicate for {:?}",
                session.filter()
            );
        }
        assert_eq!(session.match_count(), Some(expected.len()));
        assert_eq!(
            session.sidebar().count_text.as_deref(),
            Some(format::parcel_count(expected.len()).as_str())
        );
    }

    #[test]
    fn actions_before_ready_are_ignored() {
        let mut session = session();
        session.set_zone(ZoneCategory::Trade, false);
        session.search("main");
        session.set_overlay(Overlay::IncomeTracts, true);
        session.toggle_basemap();
        session.pointer_move([0.25, 0.25]);
        assert!(session.renderer().calls().is_empty());
        assert!(session.sidebar().status.is_none());
        assert!(session.filter().all_zones_selected());
        assert_eq!(session.basemap(), Basemap::Street);

        assert!(session.begin_loading());
        session.set_acreage_min(10.0);
        assert_eq!(session.filter().acreage_range().0, 0.0);
        assert!(!session.begin_loading());
    }

    #[test]
    fn load_installs_layers_in_draw_order() {
        let session = ready(fixture_store());
        assert_eq!(
            session.renderer().layer_ids(),
            vec![
                "income-fill",
                "income-outline",
                "gym-buffer-5mi-fill",
                "gym-buffer-5mi-outline",
                "gym-buffer-3mi-fill",
                "gym-buffer-3mi-outline",
                "parcels-fill",
                "parcels-outline",
                "parcels-search-highlight",
                "gyms-glow",
                "gyms-circle",
                "gyms-label",
            ]
        );
        let sidebar = session.sidebar();
        assert_eq!(sidebar.city_options, vec!["EVERETT", "MONROE"]);
        assert_eq!(sidebar.city_option_pushes, 1);
        assert!(sidebar.loading_hidden);
        assert_eq!(sidebar.basemap_button.as_deref(), Some("Satellite"));
        assert_eq!(sidebar.count_text.as_deref(), Some("4 parcels shown"));
        assert!(!session.renderer().is_visible(INCOME_FILL));
        assert!(!session.renderer().is_visible("gym-buffer-3mi-fill"));
        assert!(session.renderer().is_visible(POI_LABEL));
        assert_agreement(&session);
    }

    #[test]
    fn required_load_failure_is_terminal() {
        let mut session = session();
        session.begin_loading();
        session.finish_loading(Err(LoadError {
            stage: StageKind::Parcels,
            source: StoreError::NotFeatureCollection { found: "Feature" },
        }));
        let SessionState::Error(message) = session.state() else {
            panic!("expected error state, got {:?}", session.state());
        };
        assert!(message.starts_with("Failed to load parcels"), "{message}");
        assert_eq!(
            session.sidebar().load_error.as_deref(),
            Some(format!("Error: {message}").as_str())
        );
        assert!(!session.sidebar().loading_hidden);
        assert!(session.renderer().layer_ids().is_empty());

        session.search("main");
        assert!(session.sidebar().status.is_none());
        assert!(!session.begin_loading());
    }

    #[test]
    fn every_filter_change_keeps_renderer_and_count_in_agreement() {
        let mut session = ready(fixture_store());
        session.set_zone(ZoneCategory::Residential, false);
        assert_agreement(&session);
        session.set_acreage_min(0.5);
        assert_agreement(&session);
        session.set_acreage_max(10.0);
        assert_agreement(&session);
        session.set_value_max(1_000_000);
        assert_agreement(&session);
        session.set_city(Some("EVERETT".to_string()));
        assert_agreement(&session);
        assert_eq!(session.match_count(), Some(1));
        session.set_value_min(400_000);
        assert_agreement(&session);
        assert_eq!(session.match_count(), Some(0));
        session.select_only_zones(Vec::<ZoneCategory>::new());
        assert_agreement(&session);
    }

    #[test]
    fn slider_labels_are_pushed() {
        let mut session = ready(fixture_store());
        session.set_acreage_max(100.0);
        session.set_value_max(1_500_000);
        session.set_value_min(2_500_000);
        let sidebar = session.sidebar();
        assert_eq!(sidebar.range_label(RangeControl::AcreageMax), Some("100+"));
        assert_eq!(sidebar.range_label(RangeControl::ValueMax), Some("1.5M"));
        assert_eq!(sidebar.range_label(RangeControl::ValueMin), Some("1.5M"));
        assert_eq!(session.filter().value_range(), (1_500_000, 1_500_000));
    }

    #[test]
    fn industrial_only_scenario() {
        let features: Vec<Value> = (0..10_000)
            .map(|i| {
                let zone = if i % 250 == 7 { "Industrial" } else { "Residential" };
                json!({"type": "Feature", "geometry": null,
                       "properties": {"ZONE_CAT": zone, "GIS_ACRES": (i % 50) as f64}})
            })
            .collect();
        let parcels = json!({"type": "FeatureCollection", "features": features});
        let pois = json!({"type": "FeatureCollection", "features": []});
        let store =
            FeatureStore::from_collections(collection(&parcels), collection(&pois), None, &[])
                .unwrap();

        let mut session = ready(store);
        assert_eq!(session.match_count(), Some(10_000));
        for zone in ZoneCategory::FILTERABLE {
            if *zone != ZoneCategory::Industrial {
                session.set_zone(*zone, false);
            }
        }
        assert_eq!(
            session.sidebar().count_text.as_deref(),
            Some("40 parcels shown")
        );
        assert_eq!(session.renderer().displayed_count(PARCEL_FILL), 40);
        assert_agreement(&session);
    }

    #[test]
    fn reset_restores_universal_filter_and_hides_overlays() {
        let mut session = ready(fixture_store());
        session.set_zone(ZoneCategory::Trade, false);
        session.set_acreage_min(2.0);
        session.set_city(Some("MONROE".to_string()));
        session.set_overlay(Overlay::IncomeTracts, true);
        session.set_overlay(Overlay::BufferRings(3.0), true);
        assert!(session.sidebar().legend_visible);

        session.reset_filters();
        assert_eq!(session.match_count(), Some(4));
        assert_eq!(session.renderer().layer(PARCEL_FILL).unwrap().filter, None);
        assert!(!session.renderer().is_visible(INCOME_FILL));
        assert!(!session.renderer().is_visible("gym-buffer-3mi-outline"));
        assert!(session.renderer().is_visible(POI_CIRCLE));

        let sidebar = session.sidebar();
        assert!(!sidebar.legend_visible);
        assert_eq!(sidebar.overlay_checked(Overlay::IncomeTracts), Some(false));
        assert_eq!(sidebar.overlay_checked(Overlay::BufferRings(5.0)), Some(false));
        assert_eq!(sidebar.range_label(RangeControl::AcreageMin), Some("0"));
        assert_eq!(sidebar.range_label(RangeControl::ValueMax), Some("2M+"));
        assert_eq!(sidebar.filter_state.as_ref(), Some(session.filter()));
        assert_eq!(session.filter().city(), None);
    }

    #[test]
    fn overlay_toggles_do_not_change_count() {
        let mut session = ready(fixture_store());
        session.set_zone(ZoneCategory::Services, false);
        let count = session.match_count();
        session.set_overlay(Overlay::PointsOfInterest, false);
        session.set_overlay(Overlay::BufferRings(5.0), true);
        session.set_overlay(Overlay::IncomeTracts, true);
        assert_eq!(session.match_count(), count);
        assert!(!session.renderer().is_visible(POI_LABEL));
        assert!(session.renderer().is_visible("gym-buffer-5mi-fill"));
        assert!(session.renderer().is_visible(INCOME_FILL));
        assert!(session.sidebar().legend_visible);

        session.set_overlay(Overlay::BufferRings(7.0), true);
        assert_eq!(session.overlay_visible(Overlay::BufferRings(7.0)), None);
    }

    #[test]
    fn hover_flags_at_most_one_parcel() {
        let mut session = ready(fixture_store());
        session.pointer_move([0.25, 0.25]);
        assert_eq!(session.hovered(), Some(ParcelId(0)));
        assert_eq!(session.renderer().cursor(), Cursor::Pointer);

        session.pointer_move([1.25, 0.25]);
        assert_eq!(session.hovered(), Some(ParcelId(1)));
        assert_eq!(
            session.renderer().flagged(PARCEL_SOURCE, FeatureFlag::Hover),
            vec![ParcelId(1)]
        );
        assert_eq!(
            session
                .renderer()
                .paint_value(PARCEL_FILL, "fill-opacity", ParcelId(1)),
            Some(json!(0.85))
        );

        session.pointer_move([0.75, 0.25]);
        assert_eq!(session.hovered(), None);
        assert!(session.renderer().flagged(PARCEL_SOURCE, FeatureFlag::Hover).is_empty());
        assert_eq!(session.renderer().cursor(), Cursor::Default);

        session.pointer_move([2.25, 0.25]);
        session.pointer_leave();
        assert!(session.renderer().flagged(PARCEL_SOURCE, FeatureFlag::Hover).is_empty());
    }

    #[test]
    fn hover_skips_filtered_out_parcels() {
        let mut session = ready(fixture_store());
        session.set_zone(ZoneCategory::Industrial, false);
        session.pointer_move([0.25, 0.25]);
        assert_eq!(session.hovered(), None);
        session.pointer_move([10.0, 10.0]);
        assert_eq!(session.renderer().cursor(), Cursor::Pointer);
    }

    #[test]
    fn basemap_switch_reinstalls_layers_and_reapplies_state() {
        let mut session = ready(fixture_store());
        session.set_zone(ZoneCategory::Residential, false);
        session.set_overlay(Overlay::BufferRings(3.0), true);
        session.set_overlay(Overlay::PointsOfInterest, false);
        session.search("main st");
        session.renderer_mut().clear_calls();

        session.toggle_basemap();
        assert_eq!(session.basemap(), Basemap::Satellite);

        let calls = session.renderer().calls();
        let style_at = calls.iter().position(|c| c.starts_with("set_style")).unwrap();
        let removed_parcels = calls
            .iter()
            .position(|c| c == "remove_layer parcels-fill")
            .unwrap();
        let readded_parcels = calls
            .iter()
            .position(|c| c == "add_layer parcels-fill")
            .unwrap();
        assert!(removed_parcels < style_at && style_at < readded_parcels);

        let renderer = session.renderer();
        assert_eq!(
            renderer.layer(PARCEL_OUTLINE).unwrap().spec.paint["line-color"],
            json!("#fff")
        );
        assert!(renderer.is_visible("gym-buffer-3mi-fill"));
        assert!(!renderer.is_visible("gym-buffer-5mi-fill"));
        assert!(!renderer.is_visible(POI_LABEL));
        assert_eq!(
            renderer.flagged(PARCEL_SOURCE, FeatureFlag::Searched),
            vec![ParcelId(0), ParcelId(1)]
        );
        assert_eq!(renderer.layer_ids().last(), Some(&POI_LABEL));
        assert_eq!(session.sidebar().basemap_button.as_deref(), Some("Street"));
        assert_agreement(&session);
    }

    #[test]
    fn search_for_point_of_interest_centres_and_opens_popup() {
        let mut session = ready(fixture_store());
        session.search("  oak ");
        let status = session.sidebar().status.clone().unwrap();
        assert_eq!(status.text, "Gym: Oak Fitness");
        assert_eq!(status.style, StatusStyle::Normal);
        assert_eq!(
            session.renderer().camera(),
            Some(&CameraMove::FlyTo(FlyTo {
                center: [11.0, 10.0],
                zoom: 16.0,
                duration_ms: 1500,
            }))
        );
        assert!(session.renderer().popups().is_empty());
        session.renderer_mut().settle_camera();
        let popup = &session.renderer().popups()[0];
        assert_eq!(popup.title, "Oak Fitness");
        assert_eq!(popup.position, [11.0, 10.0]);
    }

    #[test]
    fn search_for_two_addresses_frames_both() {
        let mut session = ready(fixture_store());
        session.search("main st");
        assert_eq!(
            session.sidebar().status.as_ref().map(|s| s.text.as_str()),
            Some("2 parcels match")
        );
        let Some(CameraMove::FitBounds(fit)) = session.renderer().camera() else {
            panic!("expected fit_bounds, got {:?}", session.renderer().camera());
        };
        assert!((fit.bounds.west - 0.0).abs() < 1e-9);
        assert!((fit.bounds.east - 1.5).abs() < 1e-9);
        assert!((fit.bounds.north - 0.5).abs() < 1e-9);
        assert!((fit.padding - 80.0).abs() < f64::EPSILON);
        assert!((fit.max_zoom - 17.0).abs() < f64::EPSILON);
        assert_eq!(
            session
                .renderer()
                .paint_value(layers::PARCEL_SEARCH_HIGHLIGHT, "line-width", ParcelId(0)),
            Some(json!(3.5))
        );
    }

    #[test]
    fn failed_search_clears_highlight() {
        let mut session = ready(fixture_store());
        session.search("main st");
        session.search("no such place");
        let status = session.sidebar().status.clone().unwrap();
        assert_eq!(status.text, "No parcels or gyms found");
        assert_eq!(status.style, StatusStyle::Error);
        assert!(session
            .renderer()
            .flagged(PARCEL_SOURCE, FeatureFlag::Searched)
            .is_empty());

        session.search("   ");
        assert_eq!(session.sidebar().status, Some(status));
    }

    #[test]
    fn click_opens_topmost_popup() {
        let mut session = ready(fixture_store());
        session.click([0.25, 0.25]);
        let popup = session.renderer().popups().last().unwrap().clone();
        assert_eq!(popup.title, "100 MAIN ST");
        assert_eq!(popup.row_value("Parcel ID"), Some("A1"));
        assert_eq!(popup.row_value("Market Value"), Some("$300,000"));

        session.click([10.0, 10.0]);
        let popup = session.renderer().popups().last().unwrap();
        assert_eq!(popup.title, "Iron Works Gym");

        let before = session.renderer().popups().len();
        session.click([5.0, 5.0]);
        assert_eq!(session.renderer().popups().len(), before, "income layer is hidden");

        session.set_overlay(Overlay::IncomeTracts, true);
        session.click([5.0, 5.0]);
        let popup = session.renderer().popups().last().unwrap();
        assert_eq!(popup.title, "Census Tract 401");
        assert_eq!(popup.row_value("Median Income"), Some("$81,000"));

        session.click([0.25, 0.25]);
        assert_eq!(session.renderer().popups().last().unwrap().title, "100 MAIN ST");
    }

    #[tokio::test]
    async fn loads_through_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = dir.path().join("parcels.geojson");
        let gyms = dir.path().join("gyms.geojson");
        std::fs::write(
            &parcels,
            json!({"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": square(0.0, 0.0, 0.5),
                 "properties": {"ZONE_CAT": "Trade", "SITUSCITY": "SNOHOMISH"}}
            ]})
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            &gyms,
            json!({"type": "FeatureCollection", "features": []}).to_string(),
        )
        .unwrap();

        let overrides = format!(
            "[data]\nparcels = {:?}\npoints_of_interest = {:?}\nincome_tracts = {:?}\n",
            parcels.display().to_string(),
            gyms.display().to_string(),
            dir.path().join("missing.geojson").display().to_string(),
        );
        let config = ViewerConfig::from_override_str(&overrides).unwrap();
        let mut session = Session::new(config, HeadlessMap::new(), RecordingSidebar::default());
        let pipeline = session.pipeline(reqwest::Client::new());
        session.load(&pipeline).await;

        assert_eq!(session.state(), &SessionState::Ready);
        assert_eq!(session.match_count(), Some(1));
        assert!(!session.renderer().has_source(INCOME_SOURCE));
        assert!(!session.renderer().has_layer(INCOME_FILL));
        assert_eq!(session.sidebar().city_options, vec!["SNOHOMISH"]);
    }
}
