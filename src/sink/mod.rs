//! Sink boundary: point/batch model, delivery traits, and concrete clients.
//!
//! The write registry only talks to [`PointSink`] and [`SinkConnector`]; the
//! concrete client is picked from the endpoint URL scheme:
//! - `http://` / `https://` → [`influx::InfluxHttpSink`] (InfluxDB 1.x `/write`)
//! - `file://` → [`jsonl::JsonlPointSink`] (append-only capture file)

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ItelError, Result};
use crate::write::measurement::FieldValue;

#[cfg(feature = "http")]
pub mod influx;
pub mod jsonl;
pub mod line_protocol;

/// One point in the sink's format: (measurement, tags, fields, ms timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub string_fields: BTreeMap<String, String>,
    pub numeric_fields: BTreeMap<String, FieldValue>,
    pub time_ms: i64,
}

/// Write consistency requested from the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLevel {
    All,
    Any,
    #[default]
    One,
    Quorum,
}

impl ConsistencyLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::One => "one",
            Self::Quorum => "quorum",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound batch: destination metadata plus points in contribution order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPoints {
    pub database: String,
    pub retention_policy: String,
    pub consistency: ConsistencyLevel,
    points: Vec<Point>,
}

impl BatchPoints {
    #[must_use]
    pub fn new(database: impl Into<String>, retention_policy: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            consistency: ConsistencyLevel::One,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Render the whole batch as newline-separated line protocol.
    ///
    /// Points that cannot be encoded are skipped.
    #[must_use]
    pub fn line_protocol(&self) -> String {
        self.points
            .iter()
            .filter_map(|p| line_protocol::encode_point(p).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parameters that identify a sink connection.
///
/// Retention policy and database are per-batch and deliberately excluded.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SinkIdentity {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl SinkIdentity {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
    }

    /// Basic-auth credentials, only when both halves are present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }
}

impl fmt::Debug for SinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkIdentity")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A live connection able to deliver batches. Delivery is synchronous.
pub trait PointSink: Send {
    /// Write one non-empty batch. Errors propagate to the flush caller.
    fn write(&mut self, batch: &BatchPoints) -> Result<()>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// Builds connections from identifying parameters.
pub trait SinkConnector: Send + Sync {
    fn connect(&self, identity: &SinkIdentity) -> Result<Box<dyn PointSink>>;
}

/// Picks the concrete client from the URL scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemeConnector;

impl SinkConnector for SchemeConnector {
    fn connect(&self, identity: &SinkIdentity) -> Result<Box<dyn PointSink>> {
        let url = identity.url.trim();
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(Box::new(jsonl::JsonlPointSink::open(
                jsonl::JsonlSinkConfig::at(path),
            )));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            #[cfg(feature = "http")]
            {
                return Ok(Box::new(influx::InfluxHttpSink::connect(identity)?));
            }
            #[cfg(not(feature = "http"))]
            {
                return Err(ItelError::InvalidConfig {
                    details: format!("http sinks need the `http` feature: {url}"),
                });
            }
        }
        Err(ItelError::InvalidConfig {
            details: format!("unsupported sink url: {url:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(name: &str) -> Point {
        Point {
            measurement: name.to_string(),
            tags: BTreeMap::new(),
            string_fields: BTreeMap::new(),
            numeric_fields: BTreeMap::from([("v".to_string(), FieldValue::Int(1))]),
            time_ms: 5,
        }
    }

    #[test]
    fn batch_defaults_to_consistency_one() {
        let batch = BatchPoints::new("osrs", "autogen");
        assert_eq!(batch.consistency, ConsistencyLevel::One);
        assert!(batch.is_empty());
    }

    #[test]
    fn batch_line_protocol_joins_points() {
        let mut batch = BatchPoints::new("osrs", "autogen");
        batch.push(point("a"));
        batch.push(point("b"));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.line_protocol(), "a v=1i 5\nb v=1i 5");
    }

    #[test]
    fn credentials_require_both_halves() {
        let mut id = SinkIdentity {
            url: "http://db".to_string(),
            username: "user".to_string(),
            ..SinkIdentity::default()
        };
        assert!(id.credentials().is_none());
        id.password = "pw".to_string();
        assert_eq!(id.credentials(), Some(("user", "pw")));
    }

    #[test]
    fn debug_redacts_password() {
        let id = SinkIdentity {
            url: "http://db".to_string(),
            username: "user".to_string(),
            password: "hunter2".to_string(),
            timeout: Duration::from_secs(1),
        };
        let rendered = format!("{id:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn scheme_connector_rejects_unknown_scheme() {
        let id = SinkIdentity {
            url: "ftp://db".to_string(),
            ..SinkIdentity::default()
        };
        let err = SchemeConnector.connect(&id).err().expect("should fail");
        assert_eq!(err.code(), "ITEL-1001");
    }

    #[test]
    fn scheme_connector_opens_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.jsonl");
        let id = SinkIdentity {
            url: format!("file://{}", path.display()),
            ..SinkIdentity::default()
        };
        let sink = SchemeConnector.connect(&id).expect("file sink");
        assert!(sink.endpoint().contains("points.jsonl"));
    }
}
