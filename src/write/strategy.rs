//! Per-series writer strategies: a terminal behavior plus veto filters.
//!
//! The strategy for a series is picked once, by series name, through
//! [`strategy_for`] and never changes afterwards.

#![allow(missing_docs)]

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::collect::series_names;
use crate::core::errors::{ItelError, Result};
use crate::sink::BatchPoints;
use crate::write::measurement::{FieldValue, Measurement};
use crate::write::series::Series;

/// Jitter allowance for movement-style series, in world units.
pub const POSITION_THRESHOLD: f64 = 5.0;

// ──────────────────── filters ────────────────────

/// Veto predicate evaluated against (last written, incoming).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// Drop the submission when both field maps equal the last written point.
    FullDedupe,
    /// Drop small moves of the two position fields when nothing else changed.
    PositionDedupe {
        keys: [&'static str; 2],
        threshold: f64,
    },
}

impl Filter {
    /// Whether `incoming` should reach the terminal behavior.
    #[must_use]
    pub fn admits(&self, last: Option<&Measurement>, incoming: &Measurement) -> bool {
        let Some(last) = last else {
            return true;
        };
        match self {
            Self::FullDedupe => !last.same_fields(incoming),
            Self::PositionDedupe { keys, threshold } => {
                if last.string_fields() != incoming.string_fields() {
                    return true;
                }
                for key in keys {
                    let (Some(prev), Some(curr)) = (last.numeric(key), incoming.numeric(key)) else {
                        return true;
                    };
                    if (prev.as_f64() - curr.as_f64()).abs() > *threshold {
                        return true;
                    }
                }
                let other = |m: &Measurement| -> BTreeMap<String, FieldValue> {
                    m.numeric_fields()
                        .iter()
                        .filter(|(k, _)| !keys.iter().any(|key| *key == k.as_str()))
                        .map(|(k, v)| (k.clone(), *v))
                        .collect()
                };
                other(last) != other(incoming)
            }
        }
    }
}

// ──────────────────── strategy table ────────────────────

/// Terminal behavior of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// Single pending slot, last write wins.
    Throttled,
    /// Unbounded FIFO, every submission is emitted.
    Queueing,
    /// Running per-key totals of numeric fields.
    Summing,
}

/// Terminal behavior plus the filters evaluated before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strategy {
    pub terminal: TerminalKind,
    pub filters: &'static [Filter],
}

const FULL_DEDUPE: &[Filter] = &[Filter::FullDedupe];
const SELF_DEDUPE: &[Filter] = &[Filter::PositionDedupe {
    keys: series_names::SELF_POS_KEYS,
    threshold: POSITION_THRESHOLD,
}];

/// Fixed lookup from series name to strategy.
#[must_use]
pub fn strategy_for(series_name: &str) -> Strategy {
    match series_name {
        series_names::SERIES_SELF_LOC => Strategy {
            terminal: TerminalKind::Throttled,
            filters: SELF_DEDUPE,
        },
        series_names::SERIES_ACTIVITY | series_names::SERIES_LOOT => Strategy {
            terminal: TerminalKind::Queueing,
            filters: &[],
        },
        series_names::SERIES_SKILLING_ITEMS => Strategy {
            terminal: TerminalKind::Summing,
            filters: &[],
        },
        _ => Strategy {
            terminal: TerminalKind::Throttled,
            filters: FULL_DEDUPE,
        },
    }
}

// ──────────────────── writer ────────────────────

#[derive(Debug)]
enum Terminal {
    Throttled {
        pending: Option<Measurement>,
        last_written: Option<Measurement>,
    },
    Queueing {
        queue: VecDeque<Measurement>,
    },
    Summing {
        totals: BTreeMap<String, FieldValue>,
    },
}

impl Terminal {
    fn new(kind: TerminalKind) -> Self {
        match kind {
            TerminalKind::Throttled => Self::Throttled {
                pending: None,
                last_written: None,
            },
            TerminalKind::Queueing => Self::Queueing {
                queue: VecDeque::new(),
            },
            TerminalKind::Summing => Self::Summing {
                totals: BTreeMap::new(),
            },
        }
    }

    fn last_written(&self) -> Option<&Measurement> {
        match self {
            Self::Throttled { last_written, .. } => last_written.as_ref(),
            Self::Queueing { queue } => queue.back(),
            Self::Summing { .. } => None,
        }
    }
}

/// Stateful writer owned by the registry for one series.
///
/// All state sits behind one lock so `submit` and `flush` never interleave on
/// the same series.
#[derive(Debug)]
pub struct SeriesWriter {
    series: Series,
    strategy: Strategy,
    terminal: Mutex<Terminal>,
}

impl SeriesWriter {
    #[must_use]
    pub fn new(series: Series, strategy: Strategy) -> Self {
        Self {
            series,
            strategy,
            terminal: Mutex::new(Terminal::new(strategy.terminal)),
        }
    }

    /// Writer using the lookup-table strategy for the series name.
    #[must_use]
    pub fn for_series(series: Series) -> Self {
        let strategy = strategy_for(series.name());
        Self::new(series, strategy)
    }

    #[must_use]
    pub fn series(&self) -> &Series {
        &self.series
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Offer a measurement. Returns whether it was kept.
    ///
    /// # Errors
    /// `StrategyContract` when a summing writer receives string fields.
    pub fn submit(&self, measurement: Measurement) -> Result<bool> {
        let mut terminal = self.terminal.lock();
        if matches!(*terminal, Terminal::Summing { .. }) && !measurement.string_fields().is_empty()
        {
            return Err(ItelError::StrategyContract {
                series: self.series.to_string(),
                details: format!(
                    "summing writer does not accept string fields ({})",
                    measurement
                        .string_fields()
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        let last = terminal.last_written();
        if !self
            .strategy
            .filters
            .iter()
            .all(|filter| filter.admits(last, &measurement))
        {
            return Ok(false);
        }

        match &mut *terminal {
            Terminal::Throttled { pending, .. } => *pending = Some(measurement),
            Terminal::Queueing { queue } => queue.push_back(measurement),
            Terminal::Summing { totals } => {
                for (key, value) in measurement.numeric_fields() {
                    let total = totals
                        .get(key)
                        .map_or(*value, |existing| existing.plus(*value));
                    totals.insert(key.clone(), total);
                }
            }
        }
        Ok(true)
    }

    /// True while a throttled point is waiting for the next flush.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(
            &*self.terminal.lock(),
            Terminal::Throttled {
                pending: Some(_),
                ..
            }
        )
    }

    /// Move pending state into `batch`. Returns the number of points added.
    pub fn flush(&self, batch: &mut BatchPoints) -> usize {
        let mut terminal = self.terminal.lock();
        match &mut *terminal {
            Terminal::Throttled {
                pending,
                last_written,
            } => {
                // An empty slot keeps the previous baseline for the filters.
                let Some(measurement) = pending.take() else {
                    return 0;
                };
                let point = measurement.to_point();
                *last_written = Some(measurement);
                point.map_or(0, |p| {
                    batch.push(p);
                    1
                })
            }
            Terminal::Queueing { queue } => {
                let mut added = 0;
                for point in queue.drain(..).filter_map(|m| m.to_point()) {
                    batch.push(point);
                    added += 1;
                }
                added
            }
            Terminal::Summing { totals } => {
                if totals.is_empty() {
                    return 0;
                }
                let measurement = Measurement::builder(self.series.clone())
                    .numeric_fields(std::mem::take(totals))
                    .build();
                measurement.to_point().map_or(0, |p| {
                    batch.push(p);
                    1
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Point;

    fn loc_series() -> Series {
        Series::builder(series_names::SERIES_SELF_LOC)
            .tag("user", "zezima")
            .build()
    }

    fn loc(x: i64, y: i64) -> Measurement {
        Measurement::builder(loc_series())
            .numeric_field("locX", x)
            .numeric_field("locY", y)
            .numeric_field("plane", 0)
            .build()
    }

    fn drain(writer: &SeriesWriter) -> Vec<Point> {
        let mut batch = BatchPoints::new("osrs", "autogen");
        writer.flush(&mut batch);
        batch.points().to_vec()
    }

    #[test]
    fn table_matches_series_names() {
        assert_eq!(
            strategy_for(series_names::SERIES_SELF_LOC).filters,
            SELF_DEDUPE
        );
        assert_eq!(
            strategy_for(series_names::SERIES_ACTIVITY).terminal,
            TerminalKind::Queueing
        );
        assert_eq!(
            strategy_for(series_names::SERIES_LOOT).terminal,
            TerminalKind::Queueing
        );
        assert_eq!(
            strategy_for(series_names::SERIES_SKILLING_ITEMS).terminal,
            TerminalKind::Summing
        );
        let fallback = strategy_for(series_names::SERIES_SKILL);
        assert_eq!(fallback.terminal, TerminalKind::Throttled);
        assert_eq!(fallback.filters, FULL_DEDUPE);
    }

    #[test]
    fn throttled_last_write_wins() {
        let writer = SeriesWriter::for_series(Series::named(series_names::SERIES_SKILL));
        assert!(!writer.is_blocked());
        let a = Measurement::builder(writer.series().clone())
            .numeric_field("xp", 10)
            .build();
        let b = Measurement::builder(writer.series().clone())
            .numeric_field("xp", 20)
            .build();
        assert!(writer.submit(a).unwrap());
        assert!(writer.is_blocked());
        assert!(writer.submit(b).unwrap());

        let points = drain(&writer);
        assert!(!writer.is_blocked());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].numeric_fields["xp"], FieldValue::Int(20));
    }

    #[test]
    fn full_dedupe_is_idempotent() {
        let writer = SeriesWriter::for_series(Series::named(series_names::SERIES_SELF));
        let m = || {
            Measurement::builder(writer.series().clone())
                .numeric_field("combat", 99)
                .build()
        };
        writer.submit(m()).unwrap();
        writer.submit(m()).unwrap();
        assert_eq!(drain(&writer).len(), 1);
        assert!(drain(&writer).is_empty());

        // Same values after the flush are filtered against the baseline.
        assert!(!writer.submit(m()).unwrap());
        assert!(drain(&writer).is_empty());
    }

    #[test]
    fn position_dedupe_suppresses_jitter() {
        let writer = SeriesWriter::for_series(loc_series());
        writer.submit(loc(100, 100)).unwrap();
        assert_eq!(drain(&writer).len(), 1);

        assert!(!writer.submit(loc(103, 100)).unwrap());
        assert!(drain(&writer).is_empty());

        assert!(writer.submit(loc(106, 100)).unwrap());
        let points = drain(&writer);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].numeric_fields["locX"], FieldValue::Int(106));
    }

    #[test]
    fn position_dedupe_passes_other_field_changes() {
        let writer = SeriesWriter::for_series(loc_series());
        writer.submit(loc(100, 100)).unwrap();
        drain(&writer);

        let moved_plane = Measurement::builder(loc_series())
            .numeric_field("locX", 101)
            .numeric_field("locY", 100)
            .numeric_field("plane", 1)
            .build();
        assert!(writer.submit(moved_plane).unwrap());

        let missing_axis = Measurement::builder(loc_series())
            .numeric_field("locX", 100)
            .numeric_field("plane", 0)
            .build();
        assert!(writer.submit(missing_axis).unwrap());

        let with_world = Measurement::builder(loc_series())
            .numeric_field("locX", 100)
            .numeric_field("locY", 100)
            .numeric_field("plane", 0)
            .string_field("world", "302")
            .build();
        assert!(writer.submit(with_world).unwrap());
    }

    #[test]
    fn queueing_emits_every_submission_in_order() {
        let writer = SeriesWriter::for_series(Series::named(series_names::SERIES_LOOT));
        for value in [3, 1, 2] {
            writer
                .submit(
                    Measurement::builder(writer.series().clone())
                        .numeric_field("total", value)
                        .build(),
                )
                .unwrap();
        }
        assert!(!writer.is_blocked());
        let totals: Vec<FieldValue> = drain(&writer)
            .iter()
            .map(|p| p.numeric_fields["total"])
            .collect();
        assert_eq!(
            totals,
            vec![FieldValue::Int(3), FieldValue::Int(1), FieldValue::Int(2)]
        );
        assert!(drain(&writer).is_empty());
    }

    #[test]
    fn summing_accumulates_then_resets() {
        let series = Series::named(series_names::SERIES_SKILLING_ITEMS);
        let writer = SeriesWriter::for_series(series.clone());
        for (key, value) in [("a", 2), ("a", 3), ("b", 1)] {
            writer
                .submit(Measurement::builder(series.clone()).numeric_field(key, value).build())
                .unwrap();
        }
        let points = drain(&writer);
        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].numeric_fields,
            BTreeMap::from([
                ("a".to_string(), FieldValue::Int(5)),
                ("b".to_string(), FieldValue::Int(1)),
            ])
        );
        assert!(drain(&writer).is_empty());
    }

    #[test]
    fn summing_rejects_string_fields() {
        let series = Series::named(series_names::SERIES_SKILLING_ITEMS);
        let writer = SeriesWriter::for_series(series.clone());
        let bad = Measurement::builder(series)
            .numeric_field("xp", 1)
            .string_field("item", "logs")
            .build();
        let err = writer.submit(bad).unwrap_err();
        assert_eq!(err.code(), "ITEL-2001");
        assert!(drain(&writer).is_empty());
    }

    #[test]
    fn empty_measurement_never_reaches_batch() {
        let writer = SeriesWriter::for_series(Series::named(series_names::SERIES_SKILL));
        writer
            .submit(Measurement::builder(writer.series().clone()).build())
            .unwrap();
        assert!(writer.is_blocked());
        assert!(drain(&writer).is_empty());
        assert!(!writer.is_blocked());
    }
}
