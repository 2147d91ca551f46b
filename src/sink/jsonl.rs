//! JSONL capture sink for `file://` endpoints.
//!
//! Each point becomes one self-contained JSON object carrying the batch's
//! database, retention policy and consistency. A whole batch is assembled in
//! memory and written with one `write_all`, so a tailing reader never sees a
//! partial batch.
//!
//! Fallback chain:
//! 1. Primary file path
//! 2. Fallback path (optional)
//! 3. Unavailable: `write` returns an error so the flush caller backs off
//!
//! While degraded, every write first retries the primary path.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{ItelError, Result};
use crate::sink::{BatchPoints, ConsistencyLevel, Point, PointSink, line_protocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Normal,
    Fallback,
    Unavailable,
}

/// Configuration for the JSONL sink.
#[derive(Debug, Clone)]
pub struct JsonlSinkConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Size that triggers rotation before the next batch. Default: 64 MiB.
    pub max_size_bytes: u64,
    /// Rotated files kept next to the primary. Default: 5.
    pub max_rotated_files: u32,
}

impl JsonlSinkConfig {
    /// Defaults for a capture file at `path` with no fallback.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: None,
            max_size_bytes: 64 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

#[derive(Serialize)]
struct PointRecord<'a> {
    db: &'a str,
    rp: &'a str,
    consistency: ConsistencyLevel,
    #[serde(flatten)]
    point: &'a Point,
}

/// Append-only JSONL point sink with rotation and fallback.
pub struct JsonlPointSink {
    config: JsonlSinkConfig,
    writer: Option<BufWriter<File>>,
    state: SinkState,
    bytes_written: u64,
}

impl JsonlPointSink {
    /// Open the capture file, falling back when the primary path fails.
    #[must_use]
    pub fn open(config: JsonlSinkConfig) -> Self {
        let mut sink = Self {
            config,
            writer: None,
            state: SinkState::Unavailable,
            bytes_written: 0,
        };
        sink.try_open_primary();
        sink
    }

    /// Current degradation state.
    #[must_use]
    pub fn state(&self) -> &str {
        match self.state {
            SinkState::Normal => "normal",
            SinkState::Fallback => "fallback",
            SinkState::Unavailable => "unavailable",
        }
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn active_path(&self) -> Option<&Path> {
        match self.state {
            SinkState::Normal => Some(&self.config.path),
            SinkState::Fallback => self.config.fallback_path.as_deref(),
            SinkState::Unavailable => None,
        }
    }

    fn render(batch: &BatchPoints) -> Result<String> {
        let mut out = String::new();
        for point in batch.points() {
            if let Err(e) = line_protocol::encode_point(point) {
                tracing::warn!(error = %e, "point dropped");
                continue;
            }
            let record = PointRecord {
                db: &batch.database,
                rp: &batch.retention_policy,
                consistency: batch.consistency,
                point,
            };
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn append(&mut self, chunk: &str) -> Result<()> {
        if self.bytes_written + chunk.len() as u64 > self.config.max_size_bytes
            && self.state != SinkState::Unavailable
        {
            self.rotate();
        }

        let Some(path) = self.active_path().map(Path::to_path_buf) else {
            return Err(ItelError::delivery(self.endpoint(), "no writable capture file"));
        };
        let Some(writer) = self.writer.as_mut() else {
            self.degrade();
            return self.append(chunk);
        };
        let outcome = writer
            .write_all(chunk.as_bytes())
            .and_then(|()| writer.flush());
        match outcome {
            Ok(()) => {
                self.bytes_written += chunk.len() as u64;
                Ok(())
            }
            Err(source) => {
                tracing::warn!(path = %path.display(), error = %source, "capture write failed");
                self.degrade();
                if self.state == SinkState::Unavailable {
                    Err(ItelError::io(path, source))
                } else {
                    self.append(chunk)
                }
            }
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = SinkState::Normal;
                self.bytes_written = size;
            }
            Err(e) => {
                tracing::warn!(error = %e, "capture primary path failed");
                self.try_open_fallback();
            }
        }
    }

    fn try_open_fallback(&mut self) {
        let Some(fallback) = self.config.fallback_path.clone() else {
            self.state = SinkState::Unavailable;
            return;
        };
        match open_append(&fallback) {
            Ok((file, size)) => {
                tracing::warn!(path = %fallback.display(), "using capture fallback path");
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = SinkState::Fallback;
                self.bytes_written = size;
            }
            Err(e) => {
                tracing::error!(error = %e, "capture fallback path failed");
                self.state = SinkState::Unavailable;
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            SinkState::Normal => self.try_open_fallback(),
            SinkState::Fallback | SinkState::Unavailable => self.state = SinkState::Unavailable,
        }
    }

    fn try_recover(&mut self) {
        if let Ok((file, size)) = open_append(&self.config.path) {
            tracing::info!(path = %self.config.path.display(), "capture recovered to primary path");
            self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
            self.state = SinkState::Normal;
            self.bytes_written = size;
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;
        let Some(base) = self.active_path().map(Path::to_path_buf) else {
            return;
        };

        // .N-1 → .N, ..., .1 → .2, current → .1
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl PointSink for JsonlPointSink {
    fn write(&mut self, batch: &BatchPoints) -> Result<()> {
        let chunk = Self::render(batch)?;
        if chunk.is_empty() {
            return Ok(());
        }
        if self.state != SinkState::Normal {
            self.try_recover();
        }
        self.append(&chunk)
    }

    fn endpoint(&self) -> String {
        format!("file://{}", self.config.path.display())
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ItelError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ItelError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `points.jsonl` → `points.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::measurement::FieldValue;
    use std::collections::BTreeMap;

    fn batch(n: usize) -> BatchPoints {
        let mut batch = BatchPoints::new("osrs", "autogen");
        for i in 0..n {
            batch.push(Point {
                measurement: "rs_skill".to_string(),
                tags: BTreeMap::from([("skill".to_string(), "ATTACK".to_string())]),
                string_fields: BTreeMap::new(),
                numeric_fields: BTreeMap::from([(
                    "xp".to_string(),
                    FieldValue::Int(i64::try_from(i).unwrap()),
                )]),
                time_ms: 1_000,
            });
        }
        batch
    }

    fn config(path: PathBuf) -> JsonlSinkConfig {
        JsonlSinkConfig {
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
            ..JsonlSinkConfig::at(path)
        }
    }

    #[test]
    fn batch_becomes_one_line_per_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.jsonl");
        let mut sink = JsonlPointSink::open(config(path.clone()));
        sink.write(&batch(3)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed["db"], "osrs");
        assert_eq!(parsed["rp"], "autogen");
        assert_eq!(parsed["consistency"], "one");
        assert_eq!(parsed["measurement"], "rs_skill");
        assert_eq!(parsed["tags"]["skill"], "ATTACK");
        assert_eq!(parsed["numeric_fields"]["xp"], 2);
        assert_eq!(parsed["time_ms"], 1_000);
    }

    #[test]
    fn unencodable_points_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.jsonl");
        let mut sink = JsonlPointSink::open(config(path.clone()));
        let mut b = batch(1);
        let mut bad = b.points()[0].clone();
        bad.numeric_fields
            .insert("ratio".to_string(), FieldValue::Float(f64::NAN));
        b.push(bad);
        sink.write(&b).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut sink = JsonlPointSink::open(JsonlSinkConfig {
            max_size_bytes: 200,
            ..config(path.clone())
        });
        for _ in 0..6 {
            sink.write(&batch(2)).unwrap();
        }
        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(!rotated_name(&path, 4).exists());
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut sink = JsonlPointSink::open(JsonlSinkConfig {
            fallback_path: Some(fallback.clone()),
            ..config(PathBuf::from("/proc/itel_test_no_such_dir/points.jsonl"))
        });
        assert_eq!(sink.state(), "fallback");
        sink.write(&batch(1)).unwrap();
        assert!(!fs::read_to_string(&fallback).unwrap().is_empty());
    }

    #[test]
    fn unavailable_sink_reports_delivery_error() {
        let mut sink =
            JsonlPointSink::open(config(PathBuf::from("/proc/itel_test_no_such_dir/p.jsonl")));
        assert_eq!(sink.state(), "unavailable");
        let err = sink.write(&batch(1)).unwrap_err();
        assert!(err.is_retryable());
    }
}
