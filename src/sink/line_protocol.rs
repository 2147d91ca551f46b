//! InfluxDB line-protocol encoder (millisecond precision).
//!
//! `measurement[,tag=value...] field=value[,field=value...] timestamp`
//!
//! Escaping follows the InfluxDB 1.x rules: commas and spaces in measurement
//! names; commas, equals signs and spaces in tag keys, tag values and field
//! keys; double quotes and backslashes inside string field values. Integer
//! fields carry the `i` suffix.

use std::fmt::Write as _;

use crate::core::errors::{ItelError, Result};
use crate::sink::Point;
use crate::write::measurement::FieldValue;

enum Field<'a> {
    Numeric(FieldValue),
    Text(&'a str),
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn push_measurement(out: &mut String, raw: &str) {
    escape_into(out, raw, &[',', ' ']);
}

fn push_key(out: &mut String, raw: &str) {
    escape_into(out, raw, &[',', '=', ' ']);
}

fn push_string_value(out: &mut String, raw: &str) {
    out.push('"');
    escape_into(out, raw, &['"', '\\']);
    out.push('"');
}

fn push_numeric_value(out: &mut String, value: FieldValue) -> std::result::Result<(), String> {
    match value {
        FieldValue::Int(v) => {
            let _ = write!(out, "{v}i");
        }
        FieldValue::Float(v) if v.is_finite() => {
            let _ = write!(out, "{v}");
        }
        FieldValue::Float(v) => return Err(format!("non-finite float {v}")),
    }
    Ok(())
}

/// Encode one point.
///
/// Tags with an empty value are omitted, since the sink rejects them.
///
/// # Errors
/// `PointEncoding` for empty names or keys, no fields, or non-finite floats.
pub fn encode_point(point: &Point) -> Result<String> {
    let fail = |details: String| ItelError::PointEncoding {
        series: point.measurement.clone(),
        details,
    };
    if point.measurement.is_empty() {
        return Err(fail("empty measurement name".to_string()));
    }
    if point.string_fields.is_empty() && point.numeric_fields.is_empty() {
        return Err(fail("point has no fields".to_string()));
    }

    let mut out = String::with_capacity(64);
    push_measurement(&mut out, &point.measurement);
    for (key, value) in &point.tags {
        if key.is_empty() {
            return Err(fail("empty tag key".to_string()));
        }
        if value.is_empty() {
            continue;
        }
        out.push(',');
        push_key(&mut out, key);
        out.push('=');
        push_key(&mut out, value);
    }

    // Both maps are sorted and disjoint; merge them so output order is by key.
    let mut fields: Vec<(&str, Field<'_>)> = point
        .numeric_fields
        .iter()
        .map(|(k, v)| (k.as_str(), Field::Numeric(*v)))
        .chain(
            point
                .string_fields
                .iter()
                .map(|(k, v)| (k.as_str(), Field::Text(v.as_str()))),
        )
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    out.push(' ');
    for (i, (key, field)) in fields.into_iter().enumerate() {
        if key.is_empty() {
            return Err(fail("empty field key".to_string()));
        }
        if i > 0 {
            out.push(',');
        }
        push_key(&mut out, key);
        out.push('=');
        match field {
            Field::Text(s) => push_string_value(&mut out, s),
            Field::Numeric(v) => {
                push_numeric_value(&mut out, v).map_err(|d| fail(format!("{key}: {d}")))?;
            }
        }
    }

    let _ = write!(out, " {}", point.time_ms);
    Ok(out)
}

/// Encode every encodable point, newline-separated.
///
/// Points that fail to encode are logged and skipped so the rest of the batch
/// is still delivered.
#[must_use]
pub fn encode_points(points: &[Point]) -> String {
    let mut lines = Vec::with_capacity(points.len());
    for point in points {
        match encode_point(point) {
            Ok(line) => lines.push(line),
            Err(e) => tracing::warn!(error = %e, "point dropped"),
        }
    }
    lines.join("\n")
}
