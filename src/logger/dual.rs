//! Dual-write activity logger: JSONL always, SQLite when enabled.
//!
//! A dedicated thread owns both backends. Everyone else sends
//! [`ActivityEvent`]s over a bounded crossbeam channel with `try_send`, so
//! the tail loop never waits on logging. Events that do not fit are counted
//! and reported on the next line the thread writes.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::Config;
use crate::core::errors::{Result, TtvError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity, Sink};
#[cfg(feature = "sqlite")]
use crate::logger::sqlite::{ActivityRow, SqliteLogger};
use crate::tail::source::TailCursor;

const CHANNEL_CAPACITY: usize = 1024;

/// Consecutive SQLite write failures before the mirror is switched off.
#[cfg(feature = "sqlite")]
const SQLITE_FAILURE_LIMIT: u32 = 3;

/// Write attempts between tries of the primary path while degraded.
const RECOVERY_PROBE_EVERY: u64 = 64;

// ──────────────────── events ────────────────────

/// Which tail an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTag {
    pub cluster: String,
    pub topic: String,
    pub cursor: u64,
}

impl From<&TailCursor> for SessionTag {
    fn from(cursor: &TailCursor) -> Self {
        Self {
            cluster: cursor.cluster_id.clone(),
            topic: cursor.topic.clone(),
            cursor: cursor.id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        session: SessionTag,
        paused: bool,
        config_hash: String,
    },
    SessionStopped {
        session: SessionTag,
        reason: String,
        cycles: u64,
        uptime_secs: u64,
    },
    Paused {
        session: SessionTag,
    },
    Resumed {
        session: SessionTag,
    },
    BatchRendered {
        session: SessionTag,
        messages: usize,
        evicted: usize,
        duration_ms: u64,
    },
    FetchFailed {
        session: SessionTag,
        code: String,
        message: String,
        failures: u32,
    },
    BecameStale {
        session: SessionTag,
        failures: u32,
    },
    Recovered {
        session: SessionTag,
        after_failures: u32,
    },
    /// A run aborted with an error outside the fetch cycle.
    Error {
        session: Option<SessionTag>,
        code: String,
        message: String,
    },
    /// Stops the logger thread after flushing.
    Shutdown,
}

// ──────────────────── handle ────────────────────

/// Cheap to clone; sending never blocks.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event. A full channel drops it and bumps the drop counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected means the thread already shut down.
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only if the channel is full.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── configuration ────────────────────

pub struct DualLoggerConfig {
    /// `None` disables the SQLite mirror.
    pub sqlite_path: Option<PathBuf>,
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl DualLoggerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            sqlite_path: cfg!(feature = "sqlite").then(|| config.paths.sqlite_db.clone()),
            jsonl_config: JsonlConfig::at(&config.paths.jsonl_log),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Start the logger thread. It runs until `shutdown()` or until every handle
/// has been dropped.
pub fn spawn_logger(
    config: DualLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("ttv-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| TtvError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: DualLoggerConfig, dropped: &AtomicU64) {
    #[cfg(feature = "sqlite")]
    let mut sqlite = config
        .sqlite_path
        .and_then(|path| match SqliteLogger::open(&path) {
            Ok(db) => Some(db),
            Err(e) => {
                eprintln!("[TTV-DUAL] failed to open SQLite at {}: {e}", path.display());
                None
            }
        });
    #[cfg(not(feature = "sqlite"))]
    let _ = config.sqlite_path;

    let mut jsonl = JsonlWriter::open(config.jsonl_config);
    #[cfg(feature = "sqlite")]
    let mut sqlite_failures: u32 = 0;
    let mut writes: u64 = 0;

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        let Some(entry) = event_to_log_entry(&event) else {
            break;
        };

        writes += 1;
        if jsonl.sink() != Sink::Primary && writes % RECOVERY_PROBE_EVERY == 0 {
            jsonl.try_recover();
        }
        jsonl.write_entry(&entry);

        #[cfg(feature = "sqlite")]
        {
            if let Some(db) = &sqlite {
                if db.log_activity(&ActivityRow::from(&entry)).is_ok() {
                    sqlite_failures = 0;
                } else {
                    sqlite_failures += 1;
                    if sqlite_failures >= SQLITE_FAILURE_LIMIT {
                        eprintln!(
                            "[TTV-DUAL] SQLite write failed {sqlite_failures} times, disabling"
                        );
                        sqlite = None;
                    }
                }
            }
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn tagged(event: EventType, severity: Severity, session: &SessionTag) -> LogEntry {
    let mut entry = LogEntry::new(event, severity);
    entry.cluster = Some(session.cluster.clone());
    entry.topic = Some(session.topic.clone());
    entry.cursor = Some(session.cursor);
    entry
}

/// `None` for the shutdown sentinel.
fn event_to_log_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::SessionStarted {
            session,
            paused,
            config_hash,
        } => {
            let mut e = tagged(EventType::SessionStart, Severity::Info, session);
            e.details = Some(format!(
                "version={} paused={paused} config_hash={config_hash}",
                env!("CARGO_PKG_VERSION")
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::SessionStopped {
            session,
            reason,
            cycles,
            uptime_secs,
        } => {
            let mut e = tagged(EventType::SessionStop, Severity::Info, session);
            e.details = Some(format!("reason={reason} cycles={cycles} uptime={uptime_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::Paused { session } => tagged(EventType::Pause, Severity::Info, session),
        ActivityEvent::Resumed { session } => tagged(EventType::Resume, Severity::Info, session),
        ActivityEvent::BatchRendered {
            session,
            messages,
            evicted,
            duration_ms,
        } => {
            let mut e = tagged(EventType::BatchRender, Severity::Info, session);
            e.messages = Some(*messages as u64);
            e.evicted = Some(*evicted as u64);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FetchFailed {
            session,
            code,
            message,
            failures,
        } => {
            let mut e = tagged(EventType::FetchFail, Severity::Warning, session);
            e.failures = Some(*failures);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::BecameStale { session, failures } => {
            let mut e = tagged(EventType::Stale, Severity::Critical, session);
            e.failures = Some(*failures);
            e.ok = Some(false);
            e
        }
        ActivityEvent::Recovered {
            session,
            after_failures,
        } => {
            let mut e = tagged(EventType::Recover, Severity::Info, session);
            e.failures = Some(*after_failures);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Error {
            session,
            code,
            message,
        } => {
            let mut e = match session {
                Some(session) => tagged(EventType::Error, Severity::Critical, session),
                None => LogEntry::new(EventType::Error, Severity::Critical),
            };
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}

#[cfg(feature = "sqlite")]
#[allow(clippy::cast_possible_wrap)]
impl From<&LogEntry> for ActivityRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            timestamp: entry.ts.clone(),
            event_type: entry.event.as_str().to_string(),
            severity: entry.severity.as_str().to_string(),
            cluster: entry.cluster.clone(),
            topic: entry.topic.clone(),
            cursor: entry.cursor.map(|id| id.to_string()),
            messages: entry.messages.map(|n| n as i64),
            evicted: entry.evicted.map(|n| n as i64),
            duration_ms: entry.duration_ms.map(|n| n as i64),
            failures: entry.failures.map(i64::from),
            success: i32::from(entry.ok.unwrap_or(true)),
            error_code: entry.error_code.clone(),
            error_message: entry.error_message.clone(),
            details: entry.details.clone(),
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tag() -> SessionTag {
        SessionTag {
            cluster: "prod".to_string(),
            topic: "orders".to_string(),
            cursor: 42,
        }
    }

    fn test_config(dir: &std::path::Path, sqlite: bool) -> DualLoggerConfig {
        DualLoggerConfig {
            sqlite_path: sqlite.then(|| dir.join("activity.sqlite3")),
            jsonl_config: JsonlConfig {
                path: dir.join("activity.jsonl"),
                fallback_path: None,
                max_size_bytes: 10 * 1024 * 1024,
                max_rotated_files: 3,
                fsync_interval: Duration::from_secs(60),
            },
            channel_capacity: 64,
        }
    }

    #[test]
    fn spawn_and_shutdown_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), false)).unwrap();
        handle.send(ActivityEvent::SessionStarted {
            session: tag(),
            paused: false,
            config_hash: "abc".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert!(contents.contains("session_start"));
        assert!(contents.contains("\"cursor\":42"));
    }

    #[test]
    fn session_events_are_mirrored() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), true)).unwrap();
        handle.send(ActivityEvent::BatchRendered {
            session: tag(),
            messages: 7,
            evicted: 2,
            duration_ms: 15,
        });
        handle.send(ActivityEvent::FetchFailed {
            session: tag(),
            code: "TTV-2001".to_string(),
            message: "connection refused".to_string(),
            failures: 1,
        });
        handle.send(ActivityEvent::Paused { session: tag() });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 3);

        #[cfg(feature = "sqlite")]
        {
            let db = SqliteLogger::open(&dir.path().join("activity.sqlite3")).unwrap();
            let rows = db.recent_activity(10).unwrap();
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[1].event_type, "fetch_fail");
            assert_eq!(rows[1].success, 0);
            assert_eq!(rows[2].messages, Some(7));
            assert_eq!(
                db.messages_since("prod", "orders", "2000-01-01T00:00:00Z")
                    .unwrap(),
                7
            );
        }
    }

    #[test]
    fn clones_share_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), false)).unwrap();
        let other = handle.clone();
        handle.send(ActivityEvent::Resumed { session: tag() });
        other.send(ActivityEvent::Error {
            session: None,
            code: "TTV-3900".to_string(),
            message: "boom".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("TTV-3900"));
    }

    #[test]
    fn dropping_all_handles_stops_thread() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), false)).unwrap();
        handle.send(ActivityEvent::Paused { session: tag() });
        assert_eq!(handle.dropped_events(), 0);
        drop(handle);
        join.join().unwrap();
    }

    #[test]
    fn shutdown_sentinel_has_no_entry() {
        assert!(event_to_log_entry(&ActivityEvent::Shutdown).is_none());
        let entry = event_to_log_entry(&ActivityEvent::BecameStale {
            session: tag(),
            failures: 5,
        })
        .unwrap();
        assert_eq!(entry.event, EventType::Stale);
        assert_eq!(entry.severity, Severity::Critical);
        assert_eq!(entry.failures, Some(5));
    }

    #[test]
    fn tagged_error_carries_session() {
        let entry = event_to_log_entry(&ActivityEvent::Error {
            session: Some(tag()),
            code: "TTV-3002".to_string(),
            message: "broken pipe".to_string(),
        })
        .unwrap();
        assert_eq!(entry.event, EventType::Error);
        assert_eq!(entry.topic.as_deref(), Some("orders"));
        assert_eq!(entry.error_code.as_deref(), Some("TTV-3002"));
        assert_eq!(entry.ok, Some(false));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn activity_row_from_entry() {
        let entry = event_to_log_entry(&ActivityEvent::Recovered {
            session: tag(),
            after_failures: 3,
        })
        .unwrap();
        let row = ActivityRow::from(&entry);
        assert_eq!(row.event_type, "recover");
        assert_eq!(row.cursor.as_deref(), Some("42"));
        assert_eq!(row.failures, Some(3));
        assert_eq!(row.success, 1);
    }
}
