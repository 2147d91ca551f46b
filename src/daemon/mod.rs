//! Daemon subsystem: schedules, flush backoff, the telemetry service, the host
//! notification feed, and signal handling.

pub mod backoff;
pub mod host;
pub mod schedule;
pub mod service;
#[cfg(feature = "daemon")]
pub mod signals;
