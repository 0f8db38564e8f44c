//! Interfaces to the rendering engine and the sidebar.
//!
//! The view controller never draws anything itself. It drives a
//! [`MapRenderer`] through a MapLibre-style declarative API (sources,
//! layers, filters, per-feature state, camera) and a [`Sidebar`] that
//! shows counts, labels, and status text.

use geojson::{FeatureCollection, JsonObject};
use parcel_map_filter::FilterState;
use parcel_map_parcel_models::ParcelId;
use parcel_map_search::Status;
use parcel_map_store::geometry::Bounds;
use serde_json::Value;
use strum_macros::AsRefStr;

use crate::layers::{BasemapStyle, LayerSpec, Overlay};
use crate::popup::Popup;

/// Transient per-parcel rendering flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FeatureFlag {
    /// The pointer is over the parcel.
    Hover,
    /// The parcel matched the last address search.
    Searched,
}

/// Pointer cursor over the map canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    /// The renderer's default cursor.
    #[default]
    Default,
    /// Something clickable is under the pointer.
    Pointer,
}

/// Camera animation centred on one position.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyTo {
    /// `[lng, lat]`.
    pub center: [f64; 2],
    /// Target zoom.
    pub zoom: f64,
    /// Animation length.
    pub duration_ms: u64,
}

/// Camera animation framing a region.
#[derive(Debug, Clone, PartialEq)]
pub struct FitBounds {
    /// Region to frame.
    pub bounds: Bounds,
    /// Padding in pixels around the region.
    pub padding: f64,
    /// Zoom ceiling, so a tiny region does not over-zoom.
    pub max_zoom: f64,
    /// Animation length.
    pub duration_ms: u64,
}

/// A feature the renderer is displaying under a point.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    /// Layer that drew it.
    pub layer: String,
    /// Feature id, if the source carries ids.
    pub id: Option<u64>,
    /// Feature properties as rendered.
    pub properties: JsonObject,
}

/// The rendering engine.
///
/// Layer and source ids are the ones in [`crate::layers`]. After
/// [`MapRenderer::set_style`] returns, the new basemap is loaded and no
/// data sources or layers remain.
pub trait MapRenderer {
    /// Replaces the basemap style, dropping every data source and layer.
    fn set_style(&mut self, style: &BasemapStyle);

    /// Adds a `GeoJSON` source.
    fn add_source(&mut self, id: &str, data: FeatureCollection);

    /// Removes a source. Unknown ids are ignored.
    fn remove_source(&mut self, id: &str);

    /// Adds a layer on top of the existing ones.
    fn add_layer(&mut self, layer: &LayerSpec);

    /// Removes a layer. Unknown ids are ignored.
    fn remove_layer(&mut self, id: &str);

    /// Whether a layer currently exists.
    fn has_layer(&self, id: &str) -> bool;

    /// Moves a layer above every other layer.
    fn move_layer_to_top(&mut self, id: &str);

    /// Sets a layout property such as `visibility`.
    fn set_layout_property(&mut self, layer: &str, name: &str, value: Value);

    /// Sets a paint property.
    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value);

    /// Sets or clears (`None`) a layer's declarative filter.
    fn set_filter(&mut self, layer: &str, filter: Option<&Value>);

    /// Sets a transient flag on one parcel.
    fn set_feature_state(&mut self, source: &str, id: ParcelId, flag: FeatureFlag, value: bool);

    /// Features drawn at `[lng, lat]` by any of `layers`, topmost first.
    fn query_rendered_features(&self, position: [f64; 2], layers: &[&str])
    -> Vec<RenderedFeature>;

    /// Animates the camera to a position.
    fn fly_to(&mut self, camera: &FlyTo);

    /// Animates the camera to frame a region.
    fn fit_bounds(&mut self, camera: &FitBounds);

    /// Opens a popup immediately.
    fn show_popup(&mut self, popup: &Popup);

    /// Opens a popup once the current camera animation finishes.
    fn show_popup_after_move(&mut self, popup: &Popup) {
        self.show_popup(popup);
    }

    /// Changes the pointer cursor.
    fn set_cursor(&mut self, cursor: Cursor);
}

/// Range slider whose label is shown next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeControl {
    /// Acreage lower bound.
    AcreageMin,
    /// Acreage upper bound.
    AcreageMax,
    /// Market value lower bound.
    ValueMin,
    /// Market value upper bound.
    ValueMax,
}

/// The sidebar and loading overlay.
pub trait Sidebar {
    /// Replaces the match count text.
    fn set_count_text(&mut self, text: &str);

    /// Replaces the search status line.
    fn set_status(&mut self, status: &Status);

    /// Replaces the formatted value next to a range slider.
    fn set_range_label(&mut self, control: RangeControl, text: &str);

    /// Moves every control to reflect `state` (checkboxes, sliders, city).
    fn show_filter_state(&mut self, state: &FilterState);

    /// Fills the city selector.
    fn set_city_options(&mut self, cities: &[String]);

    /// Checks or unchecks an overlay toggle.
    fn set_overlay_checked(&mut self, overlay: Overlay, checked: bool);

    /// Shows or hides the income legend.
    fn set_legend_visible(&mut self, visible: bool);

    /// Relabels the basemap toggle button.
    fn set_basemap_button(&mut self, label: &str);

    /// Hides the loading overlay.
    fn hide_loading(&mut self);

    /// Replaces the loading overlay with an error message.
    fn show_load_error(&mut self, message: &str);
}
