//! SQLite mirror of the activity log (WAL mode), queried by `ttv history`.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;

use crate::core::errors::{Result, TtvError};

pub struct SqliteLogger {
    conn: Connection,
    path: PathBuf,
}

impl SqliteLogger {
    /// Open (or create) the database at `path`, applying PRAGMAs and schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TtvError::io(parent, source))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_activity(&self, row: &ActivityRow) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO activity_log (
                    timestamp, event_type, severity, cluster, topic, cursor,
                    messages, evicted, duration_ms, failures, success,
                    error_code, error_message, details
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            )?
            .execute(params![
                row.timestamp,
                row.event_type,
                row.severity,
                row.cluster,
                row.topic,
                row.cursor,
                row.messages,
                row.evicted,
                row.duration_ms,
                row.failures,
                row.success,
                row.error_code,
                row.error_message,
                row.details,
            ])?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_activity(&self, limit: u32) -> Result<Vec<ActivityRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT timestamp, event_type, severity, cluster, topic, cursor,
                    messages, evicted, duration_ms, failures, success,
                    error_code, error_message, details
             FROM activity_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(ActivityRow {
                    timestamp: row.get(0)?,
                    event_type: row.get(1)?,
                    severity: row.get(2)?,
                    cluster: row.get(3)?,
                    topic: row.get(4)?,
                    cursor: row.get(5)?,
                    messages: row.get(6)?,
                    evicted: row.get(7)?,
                    duration_ms: row.get(8)?,
                    failures: row.get(9)?,
                    success: row.get(10)?,
                    error_code: row.get(11)?,
                    error_message: row.get(12)?,
                    details: row.get(13)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_events_since(&self, event_type: &str, since: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM activity_log WHERE event_type = ?1 AND timestamp >= ?2",
            params![event_type, since],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total messages rendered for one topic since a timestamp.
    pub fn messages_since(&self, cluster: &str, topic: &str, since: &str) -> Result<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(messages), 0) FROM activity_log
             WHERE event_type = 'batch_render' AND cluster = ?1 AND topic = ?2
               AND timestamp >= ?3",
            params![cluster, topic, since],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Delete rows older than `retention_days`. Returns the number removed.
    pub fn prune_activity_log(&self, retention_days: u32) -> Result<usize> {
        let cutoff = cutoff(chrono::Duration::days(i64::from(retention_days)));
        let deleted = self.conn.execute(
            "DELETE FROM activity_log WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .map(|mode| mode.eq_ignore_ascii_case("wal"))
            .unwrap_or(false)
    }
}

/// The timestamp `age` ago, spelled like stored rows so text comparison orders it.
#[must_use]
pub fn cutoff(age: chrono::Duration) -> String {
    (chrono::Utc::now() - age).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Row of the `activity_log` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityRow {
    pub timestamp: String,
    pub event_type: String,
    pub severity: String,
    pub cluster: Option<String>,
    pub topic: Option<String>,
    /// Cursor ids are u64; stored as text to keep the full range.
    pub cursor: Option<String>,
    pub messages: Option<i64>,
    pub evicted: Option<i64>,
    pub duration_ms: Option<i64>,
    pub failures: Option<i64>,
    pub success: i32,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub details: Option<String>,
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[TTV-SQLITE] WARNING: requested WAL mode but got '{mode}'");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            cluster TEXT,
            topic TEXT,
            cursor TEXT,
            messages INTEGER,
            evicted INTEGER,
            duration_ms INTEGER,
            failures INTEGER,
            success INTEGER NOT NULL DEFAULT 1,
            error_code TEXT,
            error_message TEXT,
            details TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp);
        CREATE INDEX IF NOT EXISTS idx_activity_type_time ON activity_log(event_type, timestamp);
        CREATE INDEX IF NOT EXISTS idx_activity_topic ON activity_log(cluster, topic);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, SqliteLogger) {
        let dir = tempfile::tempdir().unwrap();
        let logger = SqliteLogger::open(&dir.path().join("activity.sqlite3")).unwrap();
        (dir, logger)
    }

    fn batch(ts: &str, messages: i64) -> ActivityRow {
        ActivityRow {
            timestamp: ts.to_string(),
            event_type: "batch_render".to_string(),
            severity: "info".to_string(),
            cluster: Some("prod".to_string()),
            topic: Some("orders".to_string()),
            cursor: Some(u64::MAX.to_string()),
            messages: Some(messages),
            evicted: Some(0),
            duration_ms: Some(12),
            success: 1,
            ..ActivityRow::default()
        }
    }

    #[test]
    fn wal_mode_active() {
        let (_dir, logger) = temp_db();
        assert!(logger.is_wal_mode());
    }

    #[test]
    fn insert_and_read_back_newest_first() {
        let (_dir, logger) = temp_db();
        logger.log_activity(&batch("2026-10-18T10:00:00.000Z", 3)).unwrap();
        logger
            .log_activity(&ActivityRow {
                timestamp: "2026-10-18T10:00:01.000Z".to_string(),
                event_type: "fetch_fail".to_string(),
                severity: "warning".to_string(),
                success: 0,
                error_code: Some("TTV-2001".to_string()),
                ..ActivityRow::default()
            })
            .unwrap();

        let rows = logger.recent_activity(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_type, "fetch_fail");
        assert_eq!(rows[1].cursor.as_deref(), Some("18446744073709551615"));
        assert_eq!(rows[1].messages, Some(3));
    }

    #[test]
    fn aggregates_by_topic() {
        let (_dir, logger) = temp_db();
        for i in 0..4 {
            logger
                .log_activity(&batch(&format!("2026-10-18T10:0{i}:00.000Z"), i + 1))
                .unwrap();
        }
        assert_eq!(
            logger
                .count_events_since("batch_render", "2026-10-18T10:02:00.000Z")
                .unwrap(),
            2
        );
        assert_eq!(
            logger
                .messages_since("prod", "orders", "2026-01-01T00:00:00Z")
                .unwrap(),
            10
        );
        assert_eq!(
            logger
                .messages_since("prod", "other", "2026-01-01T00:00:00Z")
                .unwrap(),
            0
        );
    }

    #[test]
    fn prune_drops_old_rows() {
        let (_dir, logger) = temp_db();
        logger.log_activity(&batch("2001-01-01T00:00:00.000Z", 1)).unwrap();
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        logger.log_activity(&batch(&now, 1)).unwrap();
        assert_eq!(logger.prune_activity_log(30).unwrap(), 1);
        assert_eq!(logger.recent_activity(10).unwrap().len(), 1);
    }

    #[test]
    fn cutoff_orders_against_stored_timestamps() {
        let hour_ago = cutoff(chrono::Duration::hours(1));
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        assert!(hour_ago < now);
        assert!(hour_ago.ends_with('Z'));
        assert_eq!(hour_ago.len(), now.len());
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.sqlite3");
        drop(SqliteLogger::open(&path).unwrap());
        let logger = SqliteLogger::open(&path).unwrap();
        assert_eq!(logger.path(), path.as_path());
        assert!(logger.is_wal_mode());
    }
}
