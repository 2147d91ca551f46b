//! Measurement: one timestamped, field-valued candidate data point.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sink::Point;
use crate::write::series::Series;

/// Numeric field value. Integers stay integers until mixed with a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer value, rendered with the `i` suffix.
    Int(i64),
    /// Floating-point value.
    Float(f64),
}

impl FieldValue {
    /// Lossy view as a float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Sum two values, widening to float when either side is a float.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.saturating_add(b)),
            (a, b) => Self::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! field_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}

field_value_from!(Int: i64, i32, i16, u32, u16, u8);
field_value_from!(Float: f64, f32);

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Int(i64::from(value))
    }
}

/// One candidate data point for a [`Series`].
///
/// String and numeric fields are disjoint key spaces; a measurement with both
/// maps empty is "empty" and never becomes a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    series: Series,
    time_ms: i64,
    string_fields: BTreeMap<String, String>,
    numeric_fields: BTreeMap<String, FieldValue>,
}

impl Measurement {
    /// Start building a measurement stamped with the current time.
    #[must_use]
    pub fn builder(series: Series) -> MeasurementBuilder {
        MeasurementBuilder {
            series,
            time_ms: None,
            string_fields: BTreeMap::new(),
            numeric_fields: BTreeMap::new(),
        }
    }

    /// Series this measurement belongs to.
    #[must_use]
    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn time_ms(&self) -> i64 {
        self.time_ms
    }

    /// String fields, sorted by key.
    #[must_use]
    pub fn string_fields(&self) -> &BTreeMap<String, String> {
        &self.string_fields
    }

    /// Numeric fields, sorted by key.
    #[must_use]
    pub fn numeric_fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.numeric_fields
    }

    /// One numeric field, if present.
    #[must_use]
    pub fn numeric(&self, key: &str) -> Option<FieldValue> {
        self.numeric_fields.get(key).copied()
    }

    /// True when both field maps are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.string_fields.is_empty() && self.numeric_fields.is_empty()
    }

    /// Whether both field maps equal `other`'s (series and time ignored).
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        self.string_fields == other.string_fields && self.numeric_fields == other.numeric_fields
    }

    /// Translate into the sink's point format; `None` when empty.
    #[must_use]
    pub fn to_point(&self) -> Option<Point> {
        if self.is_empty() {
            return None;
        }
        Some(Point {
            measurement: self.series.name().to_string(),
            tags: self.series.tags().clone(),
            string_fields: self.string_fields.clone(),
            numeric_fields: self.numeric_fields.clone(),
            time_ms: self.time_ms,
        })
    }
}

/// Construction-only mutation for [`Measurement`].
#[derive(Debug, Clone)]
#[must_use]
pub struct MeasurementBuilder {
    series: Series,
    time_ms: Option<i64>,
    string_fields: BTreeMap<String, String>,
    numeric_fields: BTreeMap<String, FieldValue>,
}

impl MeasurementBuilder {
    /// Override the timestamp (milliseconds since epoch).
    pub fn time_ms(mut self, time_ms: i64) -> Self {
        self.time_ms = Some(time_ms);
        self
    }

    /// Add a string field. Removes any numeric field under the same key.
    pub fn string_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.numeric_fields.remove(&key);
        self.string_fields.insert(key, value.into());
        self
    }

    /// Add a numeric field. Removes any string field under the same key.
    pub fn numeric_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let key = key.into();
        self.string_fields.remove(&key);
        self.numeric_fields.insert(key, value.into());
        self
    }

    /// Add several numeric fields.
    pub fn numeric_fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        for (key, value) in fields {
            self = self.numeric_field(key, value);
        }
        self
    }

    /// Finish the measurement.
    pub fn build(self) -> Measurement {
        Measurement {
            series: self.series,
            time_ms: self
                .time_ms
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            string_fields: self.string_fields,
            numeric_fields: self.numeric_fields,
        }
    }
}
