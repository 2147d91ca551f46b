//! Host notification feed.
//!
//! The host event layer reports game notifications as newline-delimited JSON,
//! one `HostEvent` per line, tagged by `"type"`:
//!
//! ```json
//! {"type":"login","user":"zezima","tags":{"worldType":"STANDARD"}}
//! {"type":"game_state","state":"LOGGED_IN"}
//! {"type":"stat_changed","skill":"FISHING","xp":1050,"level":20,"virtual_level":20}
//! {"type":"measurement","series":"rs_self","fields":{"combat":126}}
//! ```
//!
//! Malformed lines are logged and skipped; the feed ends at EOF or when the
//! shutdown flag is raised.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activity::catalog::{AreaFlags, Skill};
use crate::collect::series_names::TAG_USER;
use crate::collect::skilling::InventoryItem;
use crate::core::errors::{ItelError, Result};
use crate::daemon::service::{GameState, TelemetryService};
use crate::write::measurement::{FieldValue, Measurement};

/// One notification from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Login {
        user: String,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    GameState {
        state: GameState,
    },
    Tick {
        tick: u64,
    },
    StatChanged {
        skill: Skill,
        xp: i64,
        level: i64,
        #[serde(default)]
        virtual_level: Option<i64>,
    },
    Region {
        region: u32,
        #[serde(default)]
        plane: i32,
        #[serde(default)]
        flags: AreaFlags,
    },
    Varbits {
        values: Vec<VarbitReading>,
    },
    Inventory {
        items: Vec<InventoryItem>,
    },
    /// A ready-made data point. The session's base tags are added; explicit
    /// `tags` override them except for `user`.
    Measurement {
        series: String,
        #[serde(default)]
        tags: BTreeMap<String, String>,
        #[serde(default)]
        strings: BTreeMap<String, String>,
        #[serde(default)]
        fields: BTreeMap<String, FieldValue>,
        #[serde(default)]
        time_ms: Option<i64>,
    },
    /// Flush now, bypassing the schedule but not the backoff.
    Flush,
    /// Re-read the config file.
    Reload,
}

/// Current value of one varbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarbitReading {
    pub varbit: u32,
    pub value: i64,
}

impl HostEvent {
    /// Parse one feed line.
    ///
    /// # Errors
    /// `Serialization` for malformed JSON or unknown event types.
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Apply one event to `service`.
///
/// # Errors
/// Contract violations from `measurement` events and config reload failures.
pub fn dispatch(service: &Arc<TelemetryService>, event: HostEvent) -> Result<()> {
    match event {
        HostEvent::Login { user, tags } => service.on_login(&user, tags),
        HostEvent::GameState { state } => service.on_game_state(state),
        HostEvent::Tick { tick } => service.on_tick(tick),
        HostEvent::StatChanged {
            skill,
            xp,
            level,
            virtual_level,
        } => service.on_stat_changed(skill, xp, level, virtual_level.unwrap_or(level)),
        HostEvent::Region {
            region,
            plane,
            flags,
        } => service.on_region(region, plane, flags),
        HostEvent::Varbits { values } => {
            let values: BTreeMap<u32, i64> =
                values.into_iter().map(|r| (r.varbit, r.value)).collect();
            service.on_varbits(&values);
        }
        HostEvent::Inventory { items } => service.on_inventory(&items),
        HostEvent::Measurement {
            series,
            tags,
            strings,
            fields,
            time_ms,
        } => {
            let base = service.base_tags();
            let series = base
                .series(&series)
                .tags(tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .tag(TAG_USER, base.user.as_str())
                .build();
            let mut builder = Measurement::builder(series).numeric_fields(fields);
            for (key, value) in strings {
                builder = builder.string_field(key, value);
            }
            if let Some(time_ms) = time_ms {
                builder = builder.time_ms(time_ms);
            }
            service.submit(builder.build())?;
        }
        HostEvent::Flush => {
            let attempt = service.scheduled_flush();
            tracing::debug!(?attempt, "flush requested by host");
        }
        HostEvent::Reload => {
            service.reload_from_disk()?;
        }
    }
    Ok(())
}

/// Counters for one feed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub applied: u64,
    pub malformed: u64,
    pub rejected: u64,
}

/// Read events from `reader` until EOF or `stop()` returns true.
///
/// # Errors
/// `Io` when the underlying reader fails.
pub fn run_feed<R, S>(service: &Arc<TelemetryService>, reader: R, stop: S) -> Result<FeedStats>
where
    R: BufRead,
    S: Fn() -> bool,
{
    let mut stats = FeedStats::default();
    for (index, line) in reader.lines().enumerate() {
        if stop() {
            break;
        }
        let line = line.map_err(|source| ItelError::io("<host feed>", source))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = match HostEvent::parse(trimmed) {
            Ok(event) => event,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(line = index + 1, error = %e, "skipping malformed host event");
                continue;
            }
        };
        match dispatch(service, event) {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(line = index + 1, error = %e, code = e.code(), "host event rejected");
            }
        }
    }
    Ok(stats)
}
