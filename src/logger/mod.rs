//! Activity logging: JSONL append-only file plus an optional SQLite mirror,
//! both fed from one background thread.

pub mod dual;
pub mod jsonl;
#[cfg(feature = "sqlite")]
pub mod sqlite;
