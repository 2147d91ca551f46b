//! Top-level CLI definition and dispatch.

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use serde_json::{Value, json};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt};

use influx_telemetry::activity::catalog::{AreaFlags, Catalog, EventDef, Skill};
use influx_telemetry::core::config::Config;
use influx_telemetry::core::errors::ItelError;
use influx_telemetry::daemon::host::{FeedStats, run_feed};
use influx_telemetry::daemon::service::TelemetryService;
use influx_telemetry::daemon::signals::SignalHandler;
use influx_telemetry::sink::{Point, line_protocol};

/// Poll period of the run loop for signals and feed completion.
const RUN_LOOP_POLL: Duration = Duration::from_millis(200);

/// InfluxDB telemetry aggregator.
#[derive(Debug, Parser)]
#[command(
    name = "itel",
    author,
    version,
    about = "Aggregate game telemetry and flush it to InfluxDB",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Debug-level diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the pipeline over a host notification feed.
    Run(RunArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Query the built-in classification catalog.
    Catalog(CatalogArgs),
    /// Encode JSON points (one per line) as InfluxDB line protocol.
    Encode(EncodeArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Read host events from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CatalogArgs {
    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum CatalogCommand {
    /// List every event id with its flags.
    List,
    /// Resolve a region, skill, or event id to its classification event.
    Lookup(LookupArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct LookupArgs {
    /// Event id, e.g. CITY_VARROCK.
    #[arg(long, conflicts_with_all = ["region", "skill"])]
    id: Option<String>,
    /// Map region id; host-side overrides apply.
    #[arg(long, conflicts_with = "skill")]
    region: Option<u32>,
    /// Plane used with --region.
    #[arg(long, default_value_t = 0, requires = "region")]
    plane: i32,
    /// Wilderness indicator visible (with --region).
    #[arg(long, requires = "region")]
    wilderness: bool,
    /// Deadman world (with --region).
    #[arg(long, requires = "region")]
    deadman: bool,
    /// PvP world (with --region).
    #[arg(long, requires = "region")]
    pvp: bool,
    /// Skill name, e.g. fishing.
    #[arg(long)]
    skill: Option<String>,
}

#[derive(Debug, Clone, Args, Default)]
struct EncodeArgs {
    /// Read points from this file instead of stdin.
    #[arg(value_name = "PATH")]
    input: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Library failure.
    #[error(transparent)]
    Pipeline(#[from] ItelError),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) | Self::Pipeline(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "influx_telemetry=debug,itel=debug"
    } else {
        "influx_telemetry=info,itel=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_pipeline(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Catalog(args) => run_catalog(cli, args),
        Command::Encode(args) => run_encode(args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── run ────────────────────

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead + Send>, CliError> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| CliError::User(format!("cannot open {}: {e}", path.display())))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn run_pipeline(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    if !config.sink.is_configured() {
        tracing::warn!("sink url or database unset; points are held until configured");
    }
    let hash = config.stable_hash().unwrap_or_default();
    let service = TelemetryService::new(config);
    service.start()?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config_hash = %hash, "itel started");

    let signals = SignalHandler::new();
    let input = open_input(args.input.as_ref())?;
    let (done_tx, done_rx) = bounded::<Result<FeedStats, ItelError>>(1);
    let feed_service = service.clone();
    let feed_signals = signals.clone();
    thread::Builder::new()
        .name("itel-feed".to_string())
        .spawn(move || {
            let outcome = run_feed(&feed_service, input, || feed_signals.should_shutdown());
            let _ = done_tx.send(outcome);
        })
        .map_err(|e| CliError::Runtime(format!("failed to spawn feed thread: {e}")))?;

    let waited = await_feed(&done_rx, &signals, || {
        let _ = service.reload_from_disk();
    });
    service.shutdown();
    let stats = waited?.unwrap_or_default();
    tracing::info!(
        applied = stats.applied,
        malformed = stats.malformed,
        rejected = stats.rejected,
        "itel stopped"
    );
    if output_mode(cli) == OutputMode::Json {
        write_json_line(&json!({
            "command": "run",
            "applied": stats.applied,
            "malformed": stats.malformed,
            "rejected": stats.rejected,
        }))?;
    }
    Ok(())
}

/// Poll for the feed result, signals, and reload requests.
///
/// `Ok(None)` means shutdown was requested before the feed finished.
fn await_feed(
    done_rx: &Receiver<Result<FeedStats, ItelError>>,
    signals: &SignalHandler,
    reload: impl Fn(),
) -> Result<Option<FeedStats>, CliError> {
    loop {
        if signals.should_shutdown() {
            tracing::info!("shutdown requested");
            return Ok(None);
        }
        if signals.should_reload() {
            tracing::info!("config reload requested (SIGHUP)");
            reload();
        }
        match done_rx.recv_timeout(RUN_LOOP_POLL) {
            Ok(outcome) => return Ok(Some(outcome?)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ItelError::ChannelClosed {
                    component: "host feed",
                }
                .into());
            }
        }
    }
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let mut config = Config::load(cli.config.as_deref())?;
            if !config.sink.password.is_empty() {
                config.sink.password = "<redacted>".to_string();
            }

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config show",
                    "config": serde_json::to_value(&config)?,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.config_file.to_string_lossy(),
                        "hash": hash,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red());
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "code": e.code(),
                        "error": e.to_string(),
                    }))?,
                }
                Err(CliError::User(format!("invalid configuration ({})", e.code())))
            }
        },
    }
}

// ──────────────────── catalog ────────────────────

fn event_json(event: &EventDef) -> Value {
    json!({
        "id": event.id,
        "location": event.location,
        "skill": event.skill.map(Skill::label),
        "type": event.location_type.map(|t| t.name()),
        "priority": event.priority,
        "clears": event.clears,
        "times_out": event.times_out,
        "varbit": event.varbit,
        "regions": event.regions,
    })
}

fn print_event_human(event: &EventDef) {
    let label = event
        .skill
        .map(Skill::label)
        .or(event.location)
        .unwrap_or("-");
    let mut flags = Vec::new();
    if event.clears {
        flags.push("clears");
    }
    if event.times_out {
        flags.push("times-out");
    }
    println!(
        "{:<32} {:<28} prio={:<3} {}",
        event.id.bold(),
        label,
        event.priority,
        flags.join(",")
    );
}

fn parse_skill(raw: &str) -> Result<Skill, CliError> {
    let quoted = format!("\"{}\"", raw.trim().to_ascii_uppercase());
    serde_json::from_str(&quoted).map_err(|_| CliError::User(format!("unknown skill {raw:?}")))
}

fn run_catalog(cli: &Cli, args: &CatalogArgs) -> Result<(), CliError> {
    let catalog = Catalog::builtin();
    match &args.command {
        CatalogCommand::List => {
            match output_mode(cli) {
                OutputMode::Human => catalog.events().iter().for_each(print_event_human),
                OutputMode::Json => {
                    let events: Vec<Value> = catalog.events().iter().map(event_json).collect();
                    write_json_line(&json!({ "command": "catalog list", "events": events }))?;
                }
            }
            Ok(())
        }
        CatalogCommand::Lookup(lookup) => {
            let found = if let Some(id) = &lookup.id {
                catalog.get(id)
            } else if let Some(region) = lookup.region {
                let flags = AreaFlags {
                    wilderness: lookup.wilderness,
                    deadman_world: lookup.deadman,
                    pvp_world: lookup.pvp,
                };
                catalog.classify_area(region, lookup.plane, flags)
            } else if let Some(skill) = &lookup.skill {
                catalog.from_skill(parse_skill(skill)?)
            } else {
                return Err(CliError::User(
                    "specify one of --id, --region or --skill".to_string(),
                ));
            };

            match (output_mode(cli), found) {
                (OutputMode::Human, Some(event)) => print_event_human(event),
                (OutputMode::Human, None) => println!("no matching event"),
                (OutputMode::Json, event) => write_json_line(&json!({
                    "command": "catalog lookup",
                    "event": event.map(event_json),
                }))?,
            }
            if found.is_none() {
                return Err(CliError::User("no matching event".to_string()));
            }
            Ok(())
        }
    }
}

// ──────────────────── encode ────────────────────

fn run_encode(args: &EncodeArgs) -> Result<(), CliError> {
    let mut raw = String::new();
    open_input(args.input.as_ref())?.read_to_string(&mut raw)?;

    let mut stdout = io::stdout().lock();
    let mut failures = 0usize;
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let encoded = serde_json::from_str::<Point>(line)
            .map_err(ItelError::from)
            .and_then(|point| line_protocol::encode_point(&point));
        match encoded {
            Ok(encoded) => writeln!(stdout, "{encoded}")?,
            Err(e) => {
                failures += 1;
                tracing::warn!(line = index + 1, error = %e, "point skipped");
            }
        }
    }
    if failures > 0 {
        return Err(CliError::User(format!("{failures} point(s) could not be encoded")));
    }
    Ok(())
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("ITEL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
