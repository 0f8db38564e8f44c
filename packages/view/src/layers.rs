//! Basemaps, source ids, and the data-layer catalogue.
//!
//! Layers are listed in draw order, bottom first:
//!
//! | Layers | Source |
//! |---|---|
//! | `income-fill`, `income-outline` | `income-tracts` |
//! | `gym-buffer-{r}mi-fill`, `gym-buffer-{r}mi-outline`, largest radius first | `gym-buffer-{r}mi` |
//! | `parcels-fill`, `parcels-outline`, `parcels-search-highlight` | `parcels` |
//! | `gyms-glow`, `gyms-circle`, `gyms-label` | `gyms` |
//!
//! Paint values that depend on the basemap are resolved when the layer
//! spec is built, so switching basemap means rebuilding the layers.

use geojson::JsonObject;
use parcel_map_parcel_models::{
    FALLBACK_ZONE_COLOR, IncomeBracket, ZoneCategory, properties,
};
use serde::Serialize;
use serde_json::{Value, json};
use strum_macros::Display;

pub const PARCEL_SOURCE: &str = "parcels";
pub const POI_SOURCE: &str = "gyms";
pub const INCOME_SOURCE: &str = "income-tracts";

pub const PARCEL_FILL: &str = "parcels-fill";
pub const PARCEL_OUTLINE: &str = "parcels-outline";
pub const PARCEL_SEARCH_HIGHLIGHT: &str = "parcels-search-highlight";
pub const POI_GLOW: &str = "gyms-glow";
pub const POI_CIRCLE: &str = "gyms-circle";
pub const POI_LABEL: &str = "gyms-label";
pub const INCOME_FILL: &str = "income-fill";
pub const INCOME_OUTLINE: &str = "income-outline";

/// Layers that receive the compiled parcel filter.
pub const FILTERED_LAYERS: [&str; 2] = [PARCEL_FILL, PARCEL_OUTLINE];

/// Point-of-interest layers, bottom first.
pub const POI_LAYERS: [&str; 3] = [POI_GLOW, POI_CIRCLE, POI_LABEL];

const STREET_STYLE_URL: &str = "https://tiles.openfreemap.org/styles/liberty";
const SATELLITE_TILES: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";
const GLYPHS_URL: &str = "https://tiles.openfreemap.org/fonts/{fontstack}/{range}.pbf";

/// Source id of the buffer rings with the given radius.
#[must_use]
pub fn buffer_source(radius_miles: f64) -> String {
    format!("gym-buffer-{radius_miles}mi")
}

/// Fill layer id of the buffer rings with the given radius.
#[must_use]
pub fn buffer_fill(radius_miles: f64) -> String {
    format!("{}-fill", buffer_source(radius_miles))
}

/// Outline layer id of the buffer rings with the given radius.
#[must_use]
pub fn buffer_outline(radius_miles: f64) -> String {
    format!("{}-outline", buffer_source(radius_miles))
}

/// The two background maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Basemap {
    /// Vector street map.
    #[default]
    Street,
    /// Raster aerial imagery.
    Satellite,
}

/// A basemap style: a remote style document or an inline one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BasemapStyle {
    /// URL of a style document.
    Url(String),
    /// Inline style document.
    Inline(Value),
}

impl Basemap {
    /// Style to hand the renderer.
    #[must_use]
    pub fn style(self) -> BasemapStyle {
        match self {
            Self::Street => BasemapStyle::Url(STREET_STYLE_URL.to_string()),
            Self::Satellite => BasemapStyle::Inline(json!({
                "version": 8,
                "glyphs": GLYPHS_URL,
                "sources": {
                    "satellite": {
                        "type": "raster",
                        "tiles": [SATELLITE_TILES],
                        "tileSize": 256,
                        "attribution": "Esri, Maxar, Earthstar Geographics"
                    }
                },
                "layers": [{ "id": "satellite-tiles", "type": "raster", "source": "satellite" }]
            })),
        }
    }

    /// The other basemap.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Street => Self::Satellite,
            Self::Satellite => Self::Street,
        }
    }

    /// Toggle button text: the basemap a click switches to.
    #[must_use]
    pub const fn button_label(self) -> &'static str {
        match self {
            Self::Street => "Satellite",
            Self::Satellite => "Street",
        }
    }

    const fn is_satellite(self) -> bool {
        matches!(self, Self::Satellite)
    }
}

/// Optional layers with an independent visibility toggle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    /// Point-of-interest markers and labels. On by default.
    PointsOfInterest,
    /// Income choropleth. Off by default; its legend follows it.
    IncomeTracts,
    /// Buffer rings of one radius (miles). Off by default.
    BufferRings(f64),
}

impl Overlay {
    /// Layers whose visibility this toggle controls.
    #[must_use]
    pub fn layer_ids(self) -> Vec<String> {
        match self {
            Self::PointsOfInterest => POI_LAYERS.iter().map(ToString::to_string).collect(),
            Self::IncomeTracts => vec![INCOME_FILL.to_string(), INCOME_OUTLINE.to_string()],
            Self::BufferRings(radius) => vec![buffer_fill(radius), buffer_outline(radius)],
        }
    }
}

/// Renderer layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
    Line,
    Circle,
    Symbol,
}

/// One renderer layer, serialized in the style-spec layer shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(skip_serializing_if = "JsonObject::is_empty")]
    pub layout: JsonObject,
    pub paint: JsonObject,
}

impl LayerSpec {
    fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>, paint: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            minzoom: None,
            layout: JsonObject::new(),
            paint: object(paint),
        }
    }

    fn min_zoom(mut self, zoom: f64) -> Self {
        self.minzoom = Some(zoom);
        self
    }

    fn with_layout(mut self, layout: Value) -> Self {
        self.layout.extend(object(layout));
        self
    }

    fn hidden(self) -> Self {
        self.with_layout(json!({ "visibility": "none" }))
    }
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Value of the `visibility` layout property.
#[must_use]
pub fn visibility(visible: bool) -> Value {
    json!(if visible { "visible" } else { "none" })
}

/// Parcel fill colour: a `match` on zoning category with a fallback.
#[must_use]
pub fn zone_color_expression() -> Value {
    let mut expr = vec![json!("match"), json!(["get", properties::ZONE_CAT])];
    for zone in ZoneCategory::FILTERABLE {
        if let Some(color) = zone.color() {
            expr.push(json!(zone.as_ref()));
            expr.push(json!(color));
        }
    }
    expr.push(json!(FALLBACK_ZONE_COLOR));
    Value::Array(expr)
}

/// Income fill colour: a `match` on bracket with the no-data colour as
/// fallback.
#[must_use]
pub fn income_color_expression() -> Value {
    let mut expr = vec![json!("match"), json!(["get", properties::INCOME_BRACKET])];
    for bracket in IncomeBracket::all() {
        expr.push(json!(bracket.as_ref()));
        expr.push(json!(bracket.color()));
    }
    expr.push(json!(IncomeBracket::Nodata.color()));
    Value::Array(expr)
}

fn feature_flag(flag: &str, when_set: f64, otherwise: f64) -> Value {
    json!([
        "case",
        ["boolean", ["feature-state", flag], false],
        when_set,
        otherwise
    ])
}

/// Income choropleth layers, hidden until toggled on.
#[must_use]
pub fn income_layers(basemap: Basemap) -> Vec<LayerSpec> {
    let (opacity, outline) = if basemap.is_satellite() {
        (0.35, "rgba(255,255,255,0.3)")
    } else {
        (0.25, "rgba(0,0,0,0.15)")
    };
    vec![
        LayerSpec::new(
            INCOME_FILL,
            LayerKind::Fill,
            INCOME_SOURCE,
            json!({
                "fill-color": income_color_expression(),
                "fill-opacity": opacity,
            }),
        )
        .hidden(),
        LayerSpec::new(
            INCOME_OUTLINE,
            LayerKind::Line,
            INCOME_SOURCE,
            json!({
                "line-color": outline,
                "line-width": 1,
            }),
        )
        .hidden(),
    ]
}

const BUFFER_PALETTE: [(&str, f64); 2] = [("#ff4136", 0.10), ("#ff9800", 0.08)];

/// Buffer ring layers, hidden until toggled on. The largest radius is
/// drawn first so smaller rings stay visible on top.
#[must_use]
pub fn buffer_layers(radii_miles: &[f64]) -> Vec<LayerSpec> {
    let mut ranked: Vec<f64> = radii_miles.to_vec();
    ranked.sort_by(f64::total_cmp);

    let mut layers = Vec::with_capacity(ranked.len() * 2);
    for (rank, radius) in ranked.iter().enumerate().rev() {
        let (color, opacity) = BUFFER_PALETTE[rank % BUFFER_PALETTE.len()];
        let source = buffer_source(*radius);
        layers.push(
            LayerSpec::new(
                buffer_fill(*radius),
                LayerKind::Fill,
                source.clone(),
                json!({ "fill-color": color, "fill-opacity": opacity }),
            )
            .hidden(),
        );
        layers.push(
            LayerSpec::new(
                buffer_outline(*radius),
                LayerKind::Line,
                source,
                json!({ "line-color": color, "line-width": 0.5, "line-opacity": 0.3 }),
            )
            .hidden(),
        );
    }
    layers
}

/// Parcel fill, outline, and search highlight.
#[must_use]
pub fn parcel_layers(basemap: Basemap) -> Vec<LayerSpec> {
    let (hover_opacity, opacity, outline) = if basemap.is_satellite() {
        (0.5, 0.25, "#fff")
    } else {
        (0.85, 0.55, "#333")
    };
    vec![
        LayerSpec::new(
            PARCEL_FILL,
            LayerKind::Fill,
            PARCEL_SOURCE,
            json!({
                "fill-color": zone_color_expression(),
                "fill-opacity": feature_flag("hover", hover_opacity, opacity),
            }),
        ),
        LayerSpec::new(
            PARCEL_OUTLINE,
            LayerKind::Line,
            PARCEL_SOURCE,
            json!({
                "line-color": outline,
                "line-width": 0.5,
            }),
        )
        .min_zoom(12.0),
        LayerSpec::new(
            PARCEL_SEARCH_HIGHLIGHT,
            LayerKind::Line,
            PARCEL_SOURCE,
            json!({
                "line-color": "#e74c3c",
                "line-width": feature_flag("searched", 3.5, 0.0),
            }),
        ),
    ]
}

/// Point-of-interest glow, marker, and label.
#[must_use]
pub fn poi_layers(basemap: Basemap) -> Vec<LayerSpec> {
    let (text, halo) = if basemap.is_satellite() {
        ("#fff", "#000")
    } else {
        ("#b71c1c", "#fff")
    };
    vec![
        LayerSpec::new(
            POI_GLOW,
            LayerKind::Circle,
            POI_SOURCE,
            json!({
                "circle-radius": ["interpolate", ["linear"], ["zoom"], 8, 10, 14, 20],
                "circle-color": "rgba(255, 65, 54, 0.35)",
            }),
        ),
        LayerSpec::new(
            POI_CIRCLE,
            LayerKind::Circle,
            POI_SOURCE,
            json!({
                "circle-radius": ["interpolate", ["linear"], ["zoom"], 8, 6, 14, 12],
                "circle-color": "#ff4136",
                "circle-stroke-color": "#ffffff",
                "circle-stroke-width": 3,
            }),
        ),
        LayerSpec::new(
            POI_LABEL,
            LayerKind::Symbol,
            POI_SOURCE,
            json!({
                "text-color": text,
                "text-halo-color": halo,
                "text-halo-width": 2,
            }),
        )
        .min_zoom(11.0)
        .with_layout(json!({
            "text-field": ["get", properties::POI_NAME],
            "text-size": 12,
            "text-font": ["Noto Sans Bold"],
            "text-offset": [0, 1.8],
            "text-anchor": "top",
            "text-allow-overlap": false,
        })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basemap_toggle_and_labels() {
        assert_eq!(Basemap::default(), Basemap::Street);
        assert_eq!(Basemap::Street.toggled(), Basemap::Satellite);
        assert_eq!(Basemap::Street.button_label(), "Satellite");
        assert_eq!(Basemap::Satellite.button_label(), "Street");
        assert_eq!(
            Basemap::Street.style(),
            BasemapStyle::Url(STREET_STYLE_URL.to_string())
        );
        let BasemapStyle::Inline(style) = Basemap::Satellite.style() else {
            panic!("satellite style should be inline");
        };
        assert_eq!(style["glyphs"], json!(GLYPHS_URL));
        assert_eq!(style["sources"]["satellite"]["tiles"][0], json!(SATELLITE_TILES));
    }

    #[test]
    fn buffer_ids_drop_trailing_zero() {
        assert_eq!(buffer_source(3.0), "gym-buffer-3mi");
        assert_eq!(buffer_fill(5.0), "gym-buffer-5mi-fill");
        assert_eq!(buffer_outline(2.5), "gym-buffer-2.5mi-outline");
    }

    #[test]
    fn buffer_layers_draw_largest_first() {
        let ids: Vec<String> = buffer_layers(&[3.0, 5.0]).into_iter().map(|l| l.id).collect();
        assert_eq!(
            ids,
            vec![
                "gym-buffer-5mi-fill",
                "gym-buffer-5mi-outline",
                "gym-buffer-3mi-fill",
                "gym-buffer-3mi-outline",
            ]
        );
        let layers = buffer_layers(&[5.0, 3.0]);
        assert_eq!(layers[2].paint["fill-color"], json!("#ff4136"));
        assert_eq!(layers[0].paint["fill-color"], json!("#ff9800"));
        assert_eq!(layers[0].layout["visibility"], json!("none"));
    }

    #[test]
    fn zone_colors_cover_filterable_zones() {
        let expr = zone_color_expression();
        let items = expr.as_array().unwrap();
        assert_eq!(items.len(), 2 + ZoneCategory::FILTERABLE.len() * 2 + 1);
        assert_eq!(items[2], json!("Residential"));
        assert_eq!(items[3], json!("#f4c542"));
        assert_eq!(items.last(), Some(&json!(FALLBACK_ZONE_COLOR)));
    }

    #[test]
    fn paint_follows_basemap() {
        let street = parcel_layers(Basemap::Street);
        let satellite = parcel_layers(Basemap::Satellite);
        assert_eq!(street[1].paint["line-color"], json!("#333"));
        assert_eq!(satellite[1].paint["line-color"], json!("#fff"));
        assert_eq!(street[1].minzoom, Some(12.0));
        assert_eq!(street[0].paint["fill-opacity"][2], json!(0.85));
        assert_eq!(satellite[0].paint["fill-opacity"][3], json!(0.25));
        assert_eq!(street[2].paint["line-width"][2], json!(3.5));

        let labels = poi_layers(Basemap::Satellite);
        assert_eq!(labels[2].paint["text-halo-color"], json!("#000"));
        assert_eq!(labels[2].minzoom, Some(11.0));
        assert_eq!(labels[2].layout["text-field"], json!(["get", "name"]));
    }

    #[test]
    fn layer_spec_serializes_in_style_shape() {
        let layer = &income_layers(Basemap::Street)[0];
        let value = serde_json::to_value(layer).unwrap();
        assert_eq!(value["id"], json!("income-fill"));
        assert_eq!(value["type"], json!("fill"));
        assert_eq!(value["source"], json!("income-tracts"));
        assert_eq!(value["layout"]["visibility"], json!("none"));
        assert!(value.get("minzoom").is_none());
    }

    #[test]
    fn overlay_layer_ids() {
        assert_eq!(
            Overlay::BufferRings(3.0).layer_ids(),
            vec!["gym-buffer-3mi-fill", "gym-buffer-3mi-outline"]
        );
        assert_eq!(Overlay::PointsOfInterest.layer_ids().len(), 3);
    }
}
