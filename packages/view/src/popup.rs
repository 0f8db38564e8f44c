//! Detail popups for clicked features.

use parcel_map_filter::format;
use parcel_map_parcel_models::{
    IncomeTractAttributes, ParcelAttributes, PointOfInterestAttributes,
};

/// Shown for absent values.
pub const MISSING: &str = "—";

/// One line of popup content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupLine {
    /// A labelled table row.
    Row {
        /// Left column.
        label: &'static str,
        /// Right column.
        value: String,
    },
    /// A paragraph of text.
    Text(String),
    /// An external link opened in a new tab.
    Link {
        /// Link text.
        text: &'static str,
        /// Target URL.
        href: String,
    },
}

/// A popup anchored at a map position.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    /// `[lng, lat]` anchor.
    pub position: [f64; 2],
    /// Maximum width in pixels.
    pub max_width: u32,
    /// Header line.
    pub title: String,
    /// Body lines in display order.
    pub lines: Vec<PopupLine>,
}

fn row(label: &'static str, value: Option<String>) -> PopupLine {
    PopupLine::Row {
        label,
        value: value.unwrap_or_else(|| MISSING.to_string()),
    }
}

impl Popup {
    /// Parcel details: address header and an attribute table.
    #[must_use]
    pub fn parcel(position: [f64; 2], parcel: &ParcelAttributes) -> Self {
        Self {
            position,
            max_width: 320,
            title: parcel
                .address
                .clone()
                .unwrap_or_else(|| "No address".to_string()),
            lines: vec![
                row("Parcel ID", parcel.parcel_number.clone()),
                row("Zoning", parcel.zone.map(|z| z.to_string())),
                row("Use Code", parcel.use_code.clone()),
                row("Acres", parcel.acres.map(|a| format!("{a:.2}"))),
                row("Sq Ft", parcel.square_feet.map(format::rounded_with_separators)),
                row("City", parcel.city.clone()),
                row("ZIP", parcel.zip.clone()),
                row("Market Value", parcel.market_value.map(format::dollars)),
            ],
        }
    }

    /// Point-of-interest details: name, then whichever contact fields exist.
    #[must_use]
    pub fn point_of_interest(position: [f64; 2], poi: &PointOfInterestAttributes) -> Self {
        let mut lines = Vec::new();
        if let Some(addr) = &poi.addr {
            lines.push(PopupLine::Text(addr.clone()));
        }
        if let Some(phone) = &poi.phone {
            lines.push(PopupLine::Text(phone.clone()));
        }
        if let Some(website) = &poi.website {
            lines.push(PopupLine::Link {
                text: "Website",
                href: website.clone(),
            });
        }
        Self {
            position,
            max_width: 280,
            title: poi.name.clone().unwrap_or_default(),
            lines,
        }
    }

    /// Opened when a search lands on a point of interest: name and
    /// category.
    #[must_use]
    pub fn search_hit(position: [f64; 2], name: &str, category: Option<&str>) -> Self {
        Self {
            position,
            max_width: 280,
            title: name.to_string(),
            lines: category
                .map(|c| PopupLine::Text(c.to_string()))
                .into_iter()
                .collect(),
        }
    }

    /// Census tract details.
    #[must_use]
    pub fn income_tract(position: [f64; 2], tract: &IncomeTractAttributes) -> Self {
        let income = match tract.median_income {
            Some(value) if value > 0 => format!("${}", format::group_thousands_signed(value)),
            _ => "No data".to_string(),
        };
        Self {
            position,
            max_width: 280,
            title: tract
                .tract_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Census Tract".to_string()),
            lines: vec![
                row("Median Income", Some(income)),
                row("Bracket", Some(tract.income_bracket.label().to_string())),
                row("GEOID", tract.geoid.clone()),
            ],
        }
    }

    /// The value of a labelled row, if present.
    #[must_use]
    pub fn row_value(&self, label: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            PopupLine::Row { label: l, value } if *l == label => Some(value.as_str()),
            _ => None,
        })
    }

    /// Renders the popup body as HTML for web renderers.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = format!("<h4>{}</h4>", escape(&self.title));
        let mut in_table = false;
        for line in &self.lines {
            let is_row = matches!(line, PopupLine::Row { .. });
            if is_row && !in_table {
                html.push_str("<table>");
            } else if !is_row && in_table {
                html.push_str("</table>");
            }
            in_table = is_row;
            match line {
                PopupLine::Row { label, value } => {
                    html.push_str(&format!(
                        "<tr><td>{}</td><td>{}</td></tr>",
                        escape(label),
                        escape(value)
                    ));
                }
                PopupLine::Text(text) => html.push_str(&format!("<p>{}</p>", escape(text))),
                PopupLine::Link { text, href } => html.push_str(&format!(
                    "<p><a href=\"{}\" target=\"_blank\">{}</a></p>",
                    escape(href),
                    escape(text)
                )),
            }
        }
        if in_table {
            html.push_str("</table>");
        }
        html
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
