#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use influx_telemetry::core::errors::{ItelError, Result};
use influx_telemetry::sink::{BatchPoints, Point, PointSink, SinkConnector, SinkIdentity};
use parking_lot::Mutex;

// ──────────────────── binary runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_itel") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "itel.exe" } else { "itel" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve itel binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_with_stdin(case_name, args, "")
}

/// Run the binary with `stdin` piped in and `HOME` pointed at an empty dir,
/// so the default config path never picks up a real user config.
pub fn run_cli_with_stdin(case_name: &str, args: &[&str], stdin: &str) -> CmdResult {
    let root = std::env::temp_dir().join("itel-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let home = tempfile::tempdir().expect("create temp home");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut child = Command::new(&bin_path)
        .args(args)
        .env("HOME", home.path())
        .env("RUST_LOG", "influx_telemetry=debug")
        .env("RUST_BACKTRACE", "1")
        .env_remove("ITEL_OUTPUT_FORMAT")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn itel command");
    if let Some(mut pipe) = child.stdin.take() {
        pipe.write_all(stdin.as_bytes()).expect("write stdin");
    }
    let output = child.wait_with_output().expect("execute itel command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

// ──────────────────── recording sink ────────────────────

/// Everything a recording sink has seen, shared with the test.
#[derive(Default)]
pub struct Recorded {
    pub batches: Mutex<Vec<BatchPoints>>,
    pub connects: Mutex<Vec<SinkIdentity>>,
    pub fail_next: Mutex<bool>,
}

impl Recorded {
    pub fn points(&self) -> Vec<Point> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.points().to_vec())
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

struct RecordingSink(Arc<Recorded>);

impl PointSink for RecordingSink {
    fn write(&mut self, batch: &BatchPoints) -> Result<()> {
        if std::mem::take(&mut *self.0.fail_next.lock()) {
            return Err(ItelError::delivery(self.endpoint(), "injected failure"));
        }
        self.0.batches.lock().push(batch.clone());
        Ok(())
    }

    fn endpoint(&self) -> String {
        "recording://".to_string()
    }
}

pub struct RecordingConnector(pub Arc<Recorded>);

impl SinkConnector for RecordingConnector {
    fn connect(&self, identity: &SinkIdentity) -> Result<Box<dyn PointSink>> {
        self.0.connects.lock().push(identity.clone());
        Ok(Box::new(RecordingSink(Arc::clone(&self.0))))
    }
}

pub fn recording() -> (Arc<Recorded>, Box<dyn SinkConnector>) {
    let recorded = Arc::new(Recorded::default());
    let connector = Box::new(RecordingConnector(Arc::clone(&recorded)));
    (recorded, connector)
}
