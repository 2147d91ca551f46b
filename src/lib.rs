#![forbid(unsafe_code)]

//! Influx telemetry (itel): in-process telemetry aggregator.
//!
//! Producers submit measurements; per-series write strategies decide which of
//! them survive until the next flush, and a rate-limited flush driver delivers
//! the survivors to InfluxDB in one batch.
//!
//! 1. **Write path** (`write`): series/measurement value model, throttled,
//!    queueing and summing strategies with dedupe filters, and the registry
//! 2. **Activity resolution** (`activity`): prioritized, self-expiring
//!    classification events collapsed into one composite state
//! 3. **Daemon** (`daemon`): schedules, failure backoff, host notification feed
//!
//! # Library usage
//!
//! ```rust,no_run
//! use influx_telemetry::prelude::*;
//!
//! let registry = WriteRegistry::new(SinkConfig::default());
//! let series = Series::builder("rs_skill").tag("skill", "ATTACK").build();
//! let point = Measurement::builder(series).numeric_field("xp", 1_000).build();
//! registry.submit(point)?;
//! registry.flush()?;
//! # Ok::<(), ItelError>(())
//! ```

pub mod prelude;

pub mod activity;
pub mod collect;
pub mod core;
pub mod daemon;
pub mod sink;
pub mod write;
