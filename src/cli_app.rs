//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use crossbeam_channel::Receiver;
use serde_json::{Value, json};
use thiserror::Error;

use topic_tail_view::api::DashboardClient;
use topic_tail_view::api::listing::{GroupRow, Table};
use topic_tail_view::cli::{LineFormat, PlainView, TerminalView, render_table, table_json};
use topic_tail_view::cli::tail_screen::spawn_input;
use topic_tail_view::core::config::Config;
use topic_tail_view::core::errors::{Result as TtvResult, TtvError};
use topic_tail_view::format::{UnitTable, format_magnitude};
use topic_tail_view::logger::dual::{
    ActivityEvent, ActivityLoggerHandle, DualLoggerConfig, SessionTag, spawn_logger,
};
use topic_tail_view::runtime::signals::{ShutdownCoordinator, SignalHandler};
use topic_tail_view::tail::driver::{ControlCommand, DriverSummary, TailDriver};
use topic_tail_view::tail::{HttpTailSource, SessionSettings, TailCursor, TailSession, TailView};

/// Live topic tail and cluster listings for a Kafka dashboard server.
#[derive(Debug, Parser)]
#[command(
    name = "ttv",
    author,
    version,
    about = "Topic Tail View - live Kafka topic tailing from a dashboard server",
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
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Follow new messages on a topic.
    Tail(TailArgs),
    /// List a cluster's topics with throughput.
    Topics(TopicsArgs),
    /// List a cluster's brokers with throughput.
    Brokers(BrokersArgs),
    /// List a cluster's consumer groups.
    Groups(GroupsArgs),
    /// Show one consumer group's members and committed offsets.
    Group(GroupArgs),
    /// Show a topic's partition layout.
    Topology(TopologyArgs),
    /// Format a number the way tables show it.
    Format(FormatArgs),
    /// Show recent tail activity from the local log.
    History(HistoryArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct TailArgs {
    /// Cluster id as known to the dashboard server.
    cluster: String,
    /// Topic name.
    topic: String,
    /// Tailer cursor id to resume (random when omitted).
    #[arg(long, value_name = "ID")]
    cursor: Option<u64>,
    /// Stream entries as lines even on a terminal.
    #[arg(long)]
    plain: bool,
    /// Start with fetching stopped.
    #[arg(long)]
    paused: bool,
    /// Poll interval override.
    #[arg(long, value_name = "MILLISECONDS")]
    interval_ms: Option<u64>,
    /// Buffer size override.
    #[arg(long, value_name = "N")]
    max_entries: Option<usize>,
    /// Exit after this many cycles.
    #[arg(long, value_name = "N")]
    max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct TopicsArgs {
    /// Cluster id.
    cluster: String,
    /// Column to sort by (topic, partitions, errors, byte_rate, msg_rate).
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,
    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
    /// Show at most N rows.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct BrokersArgs {
    /// Cluster id.
    cluster: String,
    /// Column to sort by (id, hostname, byte_rate, msg_rate).
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,
    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(Debug, Clone, Args)]
struct GroupsArgs {
    /// Cluster id.
    cluster: String,
    /// Only groups consuming this topic.
    #[arg(long, value_name = "TOPIC")]
    topic: Option<String>,
    /// Column to sort by (group, state, members, topics).
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,
    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
    /// Show at most N rows.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct GroupArgs {
    /// Cluster id.
    cluster: String,
    /// Consumer group name.
    group: String,
    /// Offsets column to sort by (topic, partition, size, low, high, offset, lag, lag_pct).
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,
    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(Debug, Clone, Args)]
struct TopologyArgs {
    /// Cluster id.
    cluster: String,
    /// Topic name.
    topic: String,
    /// Column to sort by (partition, size, leader, replicas, isr, status).
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,
    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("units").args(["bytes", "count"])))]
struct FormatArgs {
    /// Value to format; -1 means unknown.
    #[arg(allow_negative_numbers = true)]
    value: f64,
    /// Binary byte units (B, KiB, MiB, ...). The default.
    #[arg(long)]
    bytes: bool,
    /// Decimal count units (K, M, G, ...).
    #[arg(long)]
    count: bool,
    /// Text appended after the unit, e.g. "/s" or "msg/s".
    #[arg(long, default_value = "", value_name = "TEXT")]
    suffix: String,
    /// Decimal places (defaults to display.decimals).
    #[arg(long, value_name = "N")]
    decimals: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct HistoryArgs {
    /// Maximum rows to return.
    #[arg(long, default_value_t = 25, value_name = "N")]
    limit: u32,
    /// Delete activity older than DAYS before listing.
    #[arg(long, value_name = "DAYS")]
    prune: Option<u32>,
    /// Window for the totals line.
    #[arg(long, default_value_t = 24, value_name = "HOURS")]
    window: u32,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
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
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
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
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<TtvError> for CliError {
    fn from(e: TtvError) -> Self {
        match e {
            TtvError::InvalidConfig { .. }
            | TtvError::MissingConfig { .. }
            | TtvError::ConfigParse { .. } => Self::User(e.to_string()),
            _ => Self::Runtime(e.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Tail(args) => run_tail(cli, args),
        Command::Topics(args) => run_topics(cli, args),
        Command::Brokers(args) => run_brokers(cli, args),
        Command::Groups(args) => run_groups(cli, args),
        Command::Group(args) => run_group(cli, args),
        Command::Topology(args) => run_topology(cli, args),
        Command::Format(args) => run_format(cli, args),
        Command::History(args) => run_history(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── tail ────────────────────

fn run_tail(cli: &Cli, args: &TailArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ms) = args.interval_ms {
        config.tail.poll_interval_ms = ms;
    }
    if let Some(n) = args.max_entries {
        config.tail.max_entries = n;
    }
    config.validate()?;

    let client = DashboardClient::new(&config.server)?;
    let cursor = match args.cursor {
        Some(id) => TailCursor::new(&args.cluster, &args.topic, id),
        None => TailCursor::random(&args.cluster, &args.topic),
    };
    let settings = SessionSettings::from(&config.tail);
    let signals = SignalHandler::new();

    let tag = SessionTag::from(&cursor);
    let mut logger = start_logger(cli, &config);
    if let Some((handle, _)) = &logger {
        handle.send(ActivityEvent::SessionStarted {
            session: tag.clone(),
            paused: args.paused,
            config_hash: config.stable_hash().unwrap_or_default(),
        });
    }
    let log_handle = logger.as_ref().map(|(handle, _)| handle.clone());

    if cli.verbose {
        eprintln!(
            "[TTV-TAIL] {cursor} via {} every {} ms",
            client.base_url(),
            config.tail.poll_interval_ms
        );
    }

    let (tx, rx) = crossbeam_channel::unbounded::<ControlCommand>();
    let plan = TailPlan {
        cursor,
        source: HttpTailSource::new(client),
        settings,
        paused: args.paused,
        max_cycles: args.max_cycles,
        logger: log_handle,
    };

    let interactive = !args.plain && io::stdout().is_terminal() && io::stdin().is_terminal();
    let outcome = if interactive {
        let view = match TerminalView::enter(format!("ttv {}", plan.cursor)) {
            Ok(view) => view,
            Err(e) => return Err(abort(&mut logger, &tag, e)),
        };
        let stop_input = Arc::new(AtomicBool::new(false));
        let mut input = match spawn_input(tx, Arc::clone(&stop_input)) {
            Ok(join) => Some(join),
            Err(e) => return Err(abort(&mut logger, &tag, e)),
        };
        let (summary, mut session) = match drive(plan, view, rx, &signals) {
            Ok(done) => done,
            Err(e) => {
                stop_and_join(&stop_input, &mut input);
                return Err(abort(&mut logger, &tag, e));
            }
        };

        let coordinator = ShutdownCoordinator {
            verbose: cli.verbose,
            ..ShutdownCoordinator::new()
        };
        let mut restore = || session.view_mut().restore();
        let mut stop = || stop_and_join(&stop_input, &mut input);
        let mut flush = || flush_logger(&mut logger);
        let mut steps: Vec<(&str, &mut dyn FnMut() -> bool)> = vec![
            ("restore terminal", &mut restore),
            ("stop input", &mut stop),
            ("flush activity log", &mut flush),
        ];
        coordinator.execute(&mut steps);
        summary
    } else {
        drop(tx);
        let format = match output_mode(cli) {
            OutputMode::Json => LineFormat::Json,
            OutputMode::Human => LineFormat::Text,
        };
        let mut view = PlainView::new(io::stdout(), format);
        if cli.quiet {
            view = view.quiet();
        }
        match drive(plan, view, rx, &signals) {
            Ok((summary, _)) => {
                flush_logger(&mut logger);
                summary
            }
            Err(e) => return Err(abort(&mut logger, &tag, e)),
        }
    };

    if !cli.quiet {
        eprintln!(
            "[TTV-TAIL] stopped ({}): {} cycles, {} messages, {} evicted, {} failed fetches",
            outcome.reason.as_str(),
            outcome.cycles,
            outcome.messages,
            outcome.evicted,
            outcome.failures
        );
    }
    Ok(())
}

struct TailPlan {
    cursor: TailCursor,
    source: HttpTailSource,
    settings: SessionSettings,
    paused: bool,
    max_cycles: Option<u64>,
    logger: Option<ActivityLoggerHandle>,
}

type HttpSession<V> = TailSession<HttpTailSource, V>;

/// Run one session to completion; signals close it through its handle.
fn drive<V: TailView>(
    plan: TailPlan,
    view: V,
    commands: Receiver<ControlCommand>,
    signals: &SignalHandler,
) -> TtvResult<(DriverSummary, HttpSession<V>)> {
    let mut session = TailSession::new(plan.cursor, plan.source, view, plan.settings);
    if plan.paused {
        session = session.paused();
    }

    let done = Arc::new(AtomicBool::new(false));
    let watcher = signals.forward_to(
        session.handle(),
        Arc::clone(&done),
        Duration::from_millis(50),
    )?;

    let mut driver = TailDriver::new(session, commands)
        .with_shutdown_flag(signals.shutdown_flag())
        .with_max_cycles(plan.max_cycles);
    if let Some(logger) = plan.logger {
        driver = driver.with_logger(logger);
    }
    let result = driver.run();

    done.store(true, Ordering::Relaxed);
    if watcher.join().is_err() {
        eprintln!("[TTV-SIGNAL] watcher thread panicked");
    }
    result
}

/// Record a failed run in the activity log, then drain the logger.
fn abort(
    logger: &mut Option<(ActivityLoggerHandle, JoinHandle<()>)>,
    session: &SessionTag,
    error: TtvError,
) -> CliError {
    if let Some((handle, _)) = logger.as_ref() {
        handle.send(ActivityEvent::Error {
            session: Some(session.clone()),
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }
    flush_logger(logger);
    error.into()
}

fn start_logger(
    cli: &Cli,
    config: &Config,
) -> Option<(ActivityLoggerHandle, JoinHandle<()>)> {
    match spawn_logger(DualLoggerConfig::from_config(config)) {
        Ok(pair) => Some(pair),
        Err(e) => {
            if !cli.quiet {
                eprintln!("[TTV-DUAL] activity logging disabled: {e}");
            }
            None
        }
    }
}

fn flush_logger(logger: &mut Option<(ActivityLoggerHandle, JoinHandle<()>)>) -> bool {
    let Some((handle, join)) = logger.take() else {
        return true;
    };
    let dropped = handle.dropped_events();
    if dropped > 0 {
        eprintln!("[TTV-DUAL] {dropped} activity events were dropped");
    }
    handle.shutdown();
    join.join().is_ok()
}

fn stop_and_join(stop: &AtomicBool, input: &mut Option<JoinHandle<()>>) -> bool {
    stop.store(true, Ordering::Relaxed);
    input.take().is_none_or(|join| join.join().is_ok())
}

// ──────────────────── listings ────────────────────

fn run_topics(cli: &Cli, args: &TopicsArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let client = DashboardClient::new(&config.server)?;
    let rows = client.topics(&args.cluster)?;

    let mut table = Table::topics(&rows, config.display.decimals);
    apply_sort(&mut table, args.sort.as_deref(), args.desc)?;
    if let Some(limit) = args.limit {
        table.truncate(limit);
    }
    emit_table(cli, "topics", &args.cluster, &table)
}

fn run_brokers(cli: &Cli, args: &BrokersArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let client = DashboardClient::new(&config.server)?;
    let rows = client.brokers(&args.cluster)?;

    let mut table = Table::brokers(&rows, config.display.decimals);
    apply_sort(&mut table, args.sort.as_deref(), args.desc)?;
    emit_table(cli, "brokers", &args.cluster, &table)
}

fn run_groups(cli: &Cli, args: &GroupsArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let client = DashboardClient::new(&config.server)?;
    let rows: Vec<GroupRow> = client.groups(&args.cluster, args.topic.as_deref())?;

    let mut table = Table::groups(&rows);
    apply_sort(&mut table, args.sort.as_deref(), args.desc)?;
    if let Some(limit) = args.limit {
        table.truncate(limit);
    }
    emit_table(cli, "groups", &args.cluster, &table)
}

fn run_group(cli: &Cli, args: &GroupArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let client = DashboardClient::new(&config.server)?;
    let members = Table::members(&client.group_members(&args.cluster, &args.group)?);
    let mut offsets = Table::offsets(&client.group_offsets(&args.cluster, &args.group)?);
    apply_sort(&mut offsets, args.sort.as_deref(), args.desc)?;

    match output_mode(cli) {
        OutputMode::Human => {
            for (label, table) in [("members", &members), ("offsets", &offsets)] {
                if table.rows.is_empty() {
                    if !cli.quiet {
                        println!("No {label} reported for group {}.", args.group);
                    }
                } else {
                    print!("{}", render_table(table));
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "group",
                "cluster": args.cluster,
                "group": args.group,
                "members": table_json(&members),
                "offsets": table_json(&offsets),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_topology(cli: &Cli, args: &TopologyArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let client = DashboardClient::new(&config.server)?;
    let rows = client.topology(&args.cluster, &args.topic)?;

    let mut table = Table::topology(&rows, config.display.decimals);
    apply_sort(&mut table, args.sort.as_deref(), args.desc)?;
    emit_table(cli, "partitions", &args.cluster, &table)
}

fn apply_sort(table: &mut Table, column: Option<&str>, descending: bool) -> Result<(), CliError> {
    let Some(name) = column else {
        return Ok(());
    };
    let Some(index) = table.column_index(name) else {
        let known: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
        return Err(CliError::User(format!(
            "unknown sort column {name:?}; expected one of: {}",
            known.join(", ")
        )));
    };
    table.sort_by(index, descending);
    Ok(())
}

fn emit_table(cli: &Cli, command: &str, cluster: &str, table: &Table) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if table.rows.is_empty() {
                if !cli.quiet {
                    println!("No {command} reported for cluster {cluster}.");
                }
            } else {
                print!("{}", render_table(table));
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": command,
                "cluster": cluster,
                "rows": table_json(table),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── format ────────────────────

fn run_format(cli: &Cli, args: &FormatArgs) -> Result<(), CliError> {
    let decimals = match args.decimals {
        Some(n) if n > 6 => {
            return Err(CliError::User(format!("--decimals must be in [0, 6], got {n}")));
        }
        Some(n) => n,
        None => Config::load(cli.config.as_deref())?.display.decimals,
    };
    let table = if args.count {
        UnitTable::COUNT
    } else {
        UnitTable::BYTES
    };
    let magnitude = format_magnitude(args.value, decimals, &args.suffix, &table);

    match output_mode(cli) {
        OutputMode::Human => {
            if cli.verbose {
                println!("{} ({})", magnitude.text, magnitude.tooltip());
            } else {
                println!("{}", magnitude.text);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "format",
                "text": magnitude.text,
                "exact": magnitude.tooltip(),
                "unknown": magnitude.is_unknown(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── history ────────────────────

#[cfg(feature = "sqlite")]
fn run_history(cli: &Cli, args: &HistoryArgs) -> Result<(), CliError> {
    use colored::Colorize;
    use topic_tail_view::logger::jsonl::EventType;
    use topic_tail_view::logger::sqlite::{SqliteLogger, cutoff};

    let config = Config::load(cli.config.as_deref())?;
    let path = &config.paths.sqlite_db;
    if !path.exists() {
        return Err(CliError::User(format!(
            "no activity database at {}; run `ttv tail` first",
            path.display()
        )));
    }
    let db = SqliteLogger::open(path)?;
    if let Some(days) = args.prune {
        let removed = db.prune_activity_log(days)?;
        if !cli.quiet {
            eprintln!("[TTV-HISTORY] pruned {removed} rows older than {days} days");
        }
    }
    let rows = db.recent_activity(args.limit)?;

    let since = cutoff(chrono::Duration::hours(i64::from(args.window)));
    let batches = db.count_events_since(EventType::BatchRender.as_str(), &since)?;
    let failed = db.count_events_since(EventType::FetchFail.as_str(), &since)?;
    let mut targets: Vec<(&str, &str)> = rows
        .iter()
        .filter_map(|row| Some((row.cluster.as_deref()?, row.topic.as_deref()?)))
        .collect();
    targets.sort_unstable();
    targets.dedup();
    let mut messages = serde_json::Map::new();
    for (cluster, topic) in targets {
        let total = db.messages_since(cluster, topic, &since)?;
        messages.insert(format!("{cluster}/{topic}"), json!(total));
    }

    match output_mode(cli) {
        OutputMode::Human => {
            if rows.is_empty() {
                println!("No activity recorded.");
            }
            for row in &rows {
                let target = match (&row.cluster, &row.topic) {
                    (Some(cluster), Some(topic)) => format!("{cluster}/{topic}"),
                    _ => "-".to_string(),
                };
                let detail = row
                    .error_message
                    .clone()
                    .or_else(|| row.messages.map(|n| format!("{n} messages")))
                    .or_else(|| row.details.clone())
                    .unwrap_or_default();
                let event = if row.success == 0 {
                    row.event_type.red().to_string()
                } else {
                    row.event_type.clone()
                };
                println!("{}  {event:<14}  {target}  {detail}", row.timestamp);
            }
            println!(
                "last {}h: {batches} batches, {failed} failed fetches",
                args.window
            );
            for (target, total) in &messages {
                println!("  {target}: {total} messages");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "history",
                "rows": serde_json::to_value(&rows)?,
                "summary": {
                    "window_hours": args.window,
                    "batches": batches,
                    "failed_fetches": failed,
                    "messages": messages,
                },
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_history(_cli: &Cli, _args: &HistoryArgs) -> Result<(), CliError> {
    Err(CliError::User(
        "history requires a build with the `sqlite` feature".to_string(),
    ))
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
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── version / output ────────────────────

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let features: Vec<&str> = [
        ("cli", cfg!(feature = "cli")),
        ("signals", cfg!(feature = "signals")),
        ("sqlite", cfg!(feature = "sqlite")),
    ]
    .into_iter()
    .filter_map(|(name, on)| on.then_some(name))
    .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("ttv {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("features: {}", features.join(","));
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "ttv",
                "version": version,
                "package": package,
                "target": target,
                "profile": profile,
                "features": features,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TTV_OUTPUT_FORMAT").ok();
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
