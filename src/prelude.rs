//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use influx_telemetry::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, FeatureToggles, SinkConfig};
pub use crate::core::errors::{ItelError, Result};

// Write path
pub use crate::write::measurement::{FieldValue, Measurement};
pub use crate::write::registry::{FlushOutcome, WriteRegistry};
pub use crate::write::series::Series;
pub use crate::write::strategy::{Filter, SeriesWriter, Strategy, TerminalKind, strategy_for};

// Sink
pub use crate::sink::{BatchPoints, Point, PointSink, SinkConnector, SinkIdentity};

// Activity
pub use crate::activity::catalog::{AreaFlags, Catalog, EventDef, Skill};
pub use crate::activity::state::{ActivityState, CompositeState};

// Collectors
pub use crate::collect::series_names::BaseTags;
pub use crate::collect::skilling::{InventoryItem, SkillingItemTracker};

// Daemon
pub use crate::daemon::backoff::FlushBackoff;
pub use crate::daemon::host::HostEvent;
pub use crate::daemon::service::{FlushAttempt, GameState, TelemetryService};
