//! ITEL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ItelError>;

/// Top-level error type for the telemetry pipeline.
#[derive(Debug, Error)]
pub enum ItelError {
    #[error("[ITEL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ITEL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ITEL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    /// A producer broke a writer strategy's contract. Programming error, never retried.
    #[error("[ITEL-2001] strategy contract violated for series {series}: {details}")]
    StrategyContract { series: String, details: String },

    #[error("[ITEL-2002] point for series {series} cannot be encoded: {details}")]
    PointEncoding { series: String, details: String },

    #[error("[ITEL-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ITEL-3001] delivery to {endpoint} failed: {details}")]
    Delivery { endpoint: String, details: String },

    #[error("[ITEL-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ITEL-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[ITEL-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl ItelError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ITEL-1001",
            Self::MissingConfig { .. } => "ITEL-1002",
            Self::ConfigParse { .. } => "ITEL-1003",
            Self::StrategyContract { .. } => "ITEL-2001",
            Self::PointEncoding { .. } => "ITEL-2002",
            Self::Serialization { .. } => "ITEL-2101",
            Self::Delivery { .. } => "ITEL-3001",
            Self::Io { .. } => "ITEL-3002",
            Self::ChannelClosed { .. } => "ITEL-3003",
            Self::Runtime { .. } => "ITEL-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Delivery { .. } | Self::Io { .. } | Self::ChannelClosed { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for delivery failures.
    #[must_use]
    pub fn delivery(endpoint: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Delivery {
            endpoint: endpoint.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for ItelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ItelError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ItelError {
    fn from(value: reqwest::Error) -> Self {
        let endpoint = value
            .url()
            .map_or_else(|| "<unknown>".to_string(), |url| redact_url(url.as_str()));
        Self::Delivery {
            endpoint,
            details: value.without_url().to_string(),
        }
    }
}

/// Strip the query string so credentials passed as parameters never reach logs.
#[cfg(feature = "http")]
fn redact_url(url: &str) -> String {
    url.split_once('?')
        .map_or_else(|| url.to_string(), |(base, _)| base.to_string())
}
