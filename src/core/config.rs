//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ItelError, Result};
use crate::sink::SinkIdentity;

/// Bounds for the flush interval, in seconds.
pub const MIN_FLUSH_INTERVAL_SECS: u64 = 5;
pub const MAX_FLUSH_INTERVAL_SECS: u64 = 5 * 60;
/// One week.
pub const MAX_ACTIVITY_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Full pipeline configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub sink: SinkConfig,
    pub schedule: ScheduleConfig,
    pub activity: ActivityConfig,
    pub features: FeatureToggles,
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Where and how batches are delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SinkConfig {
    /// `http(s)://host:port` for InfluxDB, or `file:///path/points.jsonl` for capture.
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub retention_policy: String,
    /// Per-request timeout at the sink-client boundary.
    pub timeout_ms: u64,
}

/// Periodic schedule knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub flush_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
}

/// Activity state machine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActivityConfig {
    /// Idle duration after which timing-out events expire.
    pub timeout_minutes: u64,
}

/// Independent per-category switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureToggles {
    pub write_xp: bool,
    pub write_bank_value: bool,
    pub write_self_loc: bool,
    pub write_self_meta: bool,
    pub write_kill_count: bool,
    pub write_activity: bool,
    pub write_loot: bool,
    pub write_skilling_items: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            retention_policy: "autogen".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl SinkConfig {
    /// Parameters whose change forces the cached connection to be rebuilt.
    #[must_use]
    pub fn identity(&self) -> SinkIdentity {
        SinkIdentity {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// A sink without database or endpoint is "not yet configured".
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.database.trim().is_empty() && !self.url.trim().is_empty()
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 15,
            heartbeat_interval_secs: 50,
        }
    }
}

impl ScheduleConfig {
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self { timeout_minutes: 5 }
    }
}

impl ActivityConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            write_xp: true,
            write_bank_value: true,
            write_self_loc: false,
            write_self_meta: true,
            write_kill_count: true,
            write_activity: true,
            write_loot: true,
            write_skilling_items: true,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                tracing::warn!("HOME not set, falling back to /tmp for config path");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("itel").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ItelError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::parse(&raw)?
        } else if is_explicit_path {
            return Err(ItelError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(raw)?;
        Ok(parsed)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // sink
        set_string(&mut lookup, "ITEL_SINK_URL", &mut self.sink.url);
        set_string(&mut lookup, "ITEL_SINK_DATABASE", &mut self.sink.database);
        set_string(&mut lookup, "ITEL_SINK_USERNAME", &mut self.sink.username);
        set_string(&mut lookup, "ITEL_SINK_PASSWORD", &mut self.sink.password);
        set_string(
            &mut lookup,
            "ITEL_SINK_RETENTION_POLICY",
            &mut self.sink.retention_policy,
        );
        set_u64(&mut lookup, "ITEL_SINK_TIMEOUT_MS", &mut self.sink.timeout_ms)?;

        // schedule
        set_u64(
            &mut lookup,
            "ITEL_SCHEDULE_FLUSH_INTERVAL_SECS",
            &mut self.schedule.flush_interval_secs,
        )?;
        set_u64(
            &mut lookup,
            "ITEL_SCHEDULE_HEARTBEAT_INTERVAL_SECS",
            &mut self.schedule.heartbeat_interval_secs,
        )?;

        // activity
        set_u64(
            &mut lookup,
            "ITEL_ACTIVITY_TIMEOUT_MINUTES",
            &mut self.activity.timeout_minutes,
        )?;

        // features
        let features = &mut self.features;
        for (name, slot) in [
            ("ITEL_WRITE_XP", &mut features.write_xp),
            ("ITEL_WRITE_BANK_VALUE", &mut features.write_bank_value),
            ("ITEL_WRITE_SELF_LOC", &mut features.write_self_loc),
            ("ITEL_WRITE_SELF_META", &mut features.write_self_meta),
            ("ITEL_WRITE_KILL_COUNT", &mut features.write_kill_count),
            ("ITEL_WRITE_ACTIVITY", &mut features.write_activity),
            ("ITEL_WRITE_LOOT", &mut features.write_loot),
            ("ITEL_WRITE_SKILLING_ITEMS", &mut features.write_skilling_items),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env_bool(name, &raw)?;
            }
        }

        Ok(())
    }

    fn normalize(&mut self) {
        let trimmed = self.sink.url.trim().trim_end_matches('/').to_string();
        self.sink.url = trimmed;
        self.sink.database = self.sink.database.trim().to_string();
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let flush = self.schedule.flush_interval_secs;
        if !(MIN_FLUSH_INTERVAL_SECS..=MAX_FLUSH_INTERVAL_SECS).contains(&flush) {
            return Err(ItelError::InvalidConfig {
                details: format!(
                    "schedule.flush_interval_secs must be in [{MIN_FLUSH_INTERVAL_SECS}, {MAX_FLUSH_INTERVAL_SECS}], got {flush}"
                ),
            });
        }

        if self.schedule.heartbeat_interval_secs == 0 {
            return Err(ItelError::InvalidConfig {
                details: "schedule.heartbeat_interval_secs must be >= 1".to_string(),
            });
        }

        let timeout = self.activity.timeout_minutes;
        if !(1..=MAX_ACTIVITY_TIMEOUT_MINUTES).contains(&timeout) {
            return Err(ItelError::InvalidConfig {
                details: format!(
                    "activity.timeout_minutes must be in [1, {MAX_ACTIVITY_TIMEOUT_MINUTES}], got {timeout}"
                ),
            });
        }

        if self.sink.timeout_ms == 0 {
            return Err(ItelError::InvalidConfig {
                details: "sink.timeout_ms must be > 0".to_string(),
            });
        }

        let url = self.sink.url.as_str();
        if !url.is_empty()
            && !(url.starts_with("http://")
                || url.starts_with("https://")
                || url.starts_with("file://"))
        {
            return Err(ItelError::InvalidConfig {
                details: format!("sink.url must use http://, https:// or file://, got {url:?}"),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_string<F>(lookup: &mut F, name: &str, slot: &mut String)
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw;
    }
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.parse::<u64>().map_err(|error| ItelError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| ItelError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
