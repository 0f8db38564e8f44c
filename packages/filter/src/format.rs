//! Display formatting for control labels, counts, and popup values.

/// Abbreviated currency for slider labels.
///
/// Values of a million or more render as `X.XM` with a trailing `.0`
/// dropped, values of a thousand or more as a whole number of `K`, and
/// anything smaller as the raw integer. Rounding is half away from zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn abbreviate_currency(value: u64) -> String {
    if value >= 1_000_000 {
        let millions = (value as f64 / 100_000.0).round() / 10.0;
        let text = format!("{millions:.1}");
        let text = text.strip_suffix(".0").unwrap_or(&text);
        format!("{text}M")
    } else if value >= 1_000 {
        let thousands = (value as f64 / 1_000.0).round();
        format!("{thousands:.0}K")
    } else {
        value.to_string()
    }
}

/// Acreage slider label: the raw number, without a trailing `.0`.
#[must_use]
pub fn acreage(value: f64) -> String {
    format!("{value}")
}

/// Integer with `,` thousands separators.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Signed integer with `,` thousands separators.
#[must_use]
pub fn group_thousands_signed(value: i64) -> String {
    let grouped = group_thousands(value.unsigned_abs());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Whole dollars with separators, e.g. `$1,250,000`.
#[must_use]
pub fn dollars(value: u64) -> String {
    format!("${}", group_thousands(value))
}

/// A real number rounded to whole units with separators, e.g. `43,560`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rounded_with_separators(value: f64) -> String {
    if value.is_finite() && value >= 0.0 {
        group_thousands(value.round() as u64)
    } else {
        format!("{value}")
    }
}

/// Live count label, e.g. `12,345 parcels shown`.
#[must_use]
pub fn parcel_count(count: usize) -> String {
    format!("{} parcels shown", group_thousands(count as u64))
}
