//! Write registry: lazily-populated Series → writer map and the flush driver.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::config::SinkConfig;
use crate::core::errors::Result;
use crate::sink::{BatchPoints, PointSink, SchemeConnector, SinkConnector, SinkIdentity};
use crate::write::measurement::Measurement;
use crate::write::series::Series;
use crate::write::strategy::SeriesWriter;

/// What one `flush` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Database or endpoint unset; writers were left untouched.
    NotConfigured,
    /// Writers drained but nothing was pending.
    Empty,
    /// A batch with this many points was delivered.
    Delivered { points: usize },
}

struct CachedSink {
    identity: SinkIdentity,
    sink: Box<dyn PointSink>,
}

/// Routes measurements to per-series writers and drains them into the sink.
///
/// The writer map only grows. Writers carry their own locks; `flush` holds the
/// connection lock for its whole duration so flushes never overlap.
pub struct WriteRegistry {
    writers: RwLock<HashMap<Series, Arc<SeriesWriter>>>,
    settings: RwLock<SinkConfig>,
    connector: Box<dyn SinkConnector>,
    connection: Mutex<Option<CachedSink>>,
}

impl WriteRegistry {
    /// Registry delivering through the URL-scheme connector.
    #[must_use]
    pub fn new(settings: SinkConfig) -> Self {
        Self::with_connector(settings, Box::new(SchemeConnector))
    }

    #[must_use]
    pub fn with_connector(settings: SinkConfig, connector: Box<dyn SinkConnector>) -> Self {
        Self {
            writers: RwLock::new(HashMap::new()),
            settings: RwLock::new(settings),
            connector,
            connection: Mutex::new(None),
        }
    }

    /// Replace the sink settings. A changed identity reconnects on the next flush.
    pub fn update_settings(&self, settings: SinkConfig) {
        *self.settings.write() = settings;
    }

    #[must_use]
    pub fn settings(&self) -> SinkConfig {
        self.settings.read().clone()
    }

    /// Writer for `series`, created on first use.
    #[must_use]
    pub fn writer(&self, series: &Series) -> Arc<SeriesWriter> {
        if let Some(writer) = self.writers.read().get(series) {
            return Arc::clone(writer);
        }
        let mut writers = self.writers.write();
        Arc::clone(
            writers
                .entry(series.clone())
                .or_insert_with(|| Arc::new(SeriesWriter::for_series(series.clone()))),
        )
    }

    #[must_use]
    pub fn writer_count(&self) -> usize {
        self.writers.read().len()
    }

    /// Forward a measurement to its series writer. Returns whether it was kept.
    ///
    /// # Errors
    /// `StrategyContract` when the writer's contract is violated.
    pub fn submit(&self, measurement: Measurement) -> Result<bool> {
        let writer = self.writer(measurement.series());
        writer.submit(measurement).inspect_err(|e| {
            tracing::error!(series = %writer.series(), error = %e, "measurement rejected");
        })
    }

    /// Whether a previous point for `series` is still waiting for delivery.
    #[must_use]
    pub fn is_blocked(&self, series: &Series) -> bool {
        self.writer(series).is_blocked()
    }

    /// Drain every writer into one batch and deliver it.
    ///
    /// # Errors
    /// Connection or delivery failures. Drained points are not re-queued.
    pub fn flush(&self) -> Result<FlushOutcome> {
        let mut connection = self.connection.lock();
        let settings = self.settings();
        if !settings.is_configured() {
            return Ok(FlushOutcome::NotConfigured);
        }

        let identity = settings.identity();
        let reconnect = connection
            .as_ref()
            .is_none_or(|cached| cached.identity != identity);
        if reconnect {
            if let Some(old) = connection.take() {
                tracing::info!(endpoint = %old.sink.endpoint(), "sink parameters changed, dropping connection");
            }
            let sink = self.connector.connect(&identity)?;
            tracing::info!(endpoint = %sink.endpoint(), "sink connected");
            *connection = Some(CachedSink { identity, sink });
        }

        let mut batch = BatchPoints::new(settings.database, settings.retention_policy);
        let writers: Vec<Arc<SeriesWriter>> = self.writers.read().values().cloned().collect();
        for writer in &writers {
            writer.flush(&mut batch);
        }
        if batch.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let Some(cached) = connection.as_mut() else {
            return Ok(FlushOutcome::NotConfigured);
        };
        cached.sink.write(&batch)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(points = batch.len(), "writing {}", batch.line_protocol());
        }
        Ok(FlushOutcome::Delivered {
            points: batch.len(),
        })
    }
}

impl std::fmt::Debug for WriteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteRegistry")
            .field("writers", &self.writer_count())
            .field("connected", &self.connection.lock().is_some())
            .finish_non_exhaustive()
    }
}
