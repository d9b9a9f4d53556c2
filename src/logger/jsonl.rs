//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all`, so a
//! reader tailing the file never sees a half line.
//!
//! When the primary file cannot be written the writer steps down through a
//! fallback file, then stderr (prefixed `[TTV-JSONL]`), then silent discard.
//! A logging failure never takes the tail session down with it.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TtvError};

const WRITE_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Kinds of activity recorded for a tail session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionStop,
    Pause,
    Resume,
    BatchRender,
    FetchFail,
    Stale,
    Recover,
    Error,
}

impl EventType {
    /// Same spelling as the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionStop => "session_stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::BatchRender => "batch_render",
            Self::FetchFail => "fetch_fail",
            Self::Stale => "stale",
            Self::Recover => "recover",
            Self::Error => "error",
        }
    }
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp with millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Tailer cursor id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
    /// Messages rendered in a batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<u64>,
    /// Entries evicted to keep the buffer bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Consecutive failed fetches so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Blank entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            cluster: None,
            topic: None,
            cursor: None,
            messages: None,
            evicted: None,
            duration_ms: None,
            failures: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Where the writer currently sends lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

impl Sink {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }

    const fn is_file(self) -> bool {
        matches!(self, Self::Primary | Self::Fallback)
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Second file to try when `path` is unusable.
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would grow past this size.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
    /// Force an fsync at least this often while lines are flowing.
    pub fsync_interval: Duration,
}

impl JsonlConfig {
    /// Defaults rooted at `path`, with a fallback in the temp directory.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: Some(std::env::temp_dir().join("ttv-activity.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval: Duration::from_secs(10),
        }
    }
}

/// Append-only writer with size-based rotation and a degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<BufWriter<File>>,
    sink: Sink,
    bytes_written: u64,
    last_fsync: Instant,
}

impl JsonlWriter {
    /// Open the primary file, stepping down the chain when that fails.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            sink: Sink::Discard,
            bytes_written: 0,
            last_fsync: Instant::now(),
        };
        let primary = writer.config.path.clone();
        if !writer.attach(&primary, Sink::Primary) {
            writer.step_down_from(Sink::Primary);
        }
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[TTV-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
            let _ = file.get_ref().sync_data();
        }
        self.last_fsync = Instant::now();
    }

    #[must_use]
    pub const fn sink(&self) -> Sink {
        self.sink
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Return to the primary file if it has become writable again.
    pub fn try_recover(&mut self) {
        if self.sink == Sink::Primary {
            return;
        }
        let primary = self.config.path.clone();
        if self.attach(&primary, Sink::Primary) {
            let _ = writeln!(
                io::stderr(),
                "[TTV-JSONL] recovered to primary path: {}",
                primary.display()
            );
        }
    }

    // ──────────────────── internals ────────────────────

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.sink.is_file() && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        match self.sink {
            Sink::Primary | Sink::Fallback => {
                let written = self
                    .file
                    .as_mut()
                    .is_some_and(|file| file.write_all(line.as_bytes()).is_ok());
                if written {
                    self.bytes_written += len;
                    if self.last_fsync.elapsed() >= self.config.fsync_interval {
                        self.fsync();
                    }
                } else {
                    self.step_down_from(self.sink);
                    self.write_line(line);
                }
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[TTV-JSONL] {line}");
            }
            Sink::Discard => {}
        }
    }

    /// Point the writer at `path`. Returns false when it cannot be opened.
    fn attach(&mut self, path: &Path, sink: Sink) -> bool {
        match open_append(path) {
            Ok((file, size)) => {
                self.file = Some(BufWriter::with_capacity(WRITE_BUFFER_BYTES, file));
                self.sink = sink;
                self.bytes_written = size;
                true
            }
            Err(_) => false,
        }
    }

    fn step_down_from(&mut self, failed: Sink) {
        self.file = None;
        match failed {
            Sink::Primary => {
                let fallback = self.config.fallback_path.clone();
                if let Some(path) = fallback {
                    if self.attach(&path, Sink::Fallback) {
                        let _ = writeln!(
                            io::stderr(),
                            "[TTV-JSONL] primary log unusable, using fallback: {}",
                            path.display()
                        );
                        return;
                    }
                }
                self.sink = Sink::Stderr;
                let _ = writeln!(io::stderr(), "[TTV-JSONL] no usable log file, using stderr");
            }
            Sink::Fallback => {
                self.sink = Sink::Stderr;
                let _ = writeln!(io::stderr(), "[TTV-JSONL] fallback write failed, using stderr");
            }
            Sink::Stderr | Sink::Discard => self.sink = Sink::Discard,
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.file = None;
        let current = self.sink;
        let base = match current {
            Sink::Primary => self.config.path.clone(),
            Sink::Fallback => match self.config.fallback_path.clone() {
                Some(path) => path,
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for generation in (1..keep).rev() {
            let _ = fs::rename(rotated_name(&base, generation), rotated_name(&base, generation + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        if !self.attach(&base, current) {
            self.step_down_from(current);
        }
    }
}

/// Open (creating parents) for append. Returns the file and its current size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| TtvError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TtvError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `activity.jsonl` -> `activity.jsonl.2`
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
