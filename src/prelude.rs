//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use topic_tail_view::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TtvError};

// Formatting
pub use crate::format::magnitude::{format_byte_rate, format_bytes, format_msg_rate};
pub use crate::format::{Magnitude, SortKind, UnitTable, format_magnitude};

// Dashboard API
pub use crate::api::{DashboardClient, Table};

// Tail
pub use crate::tail::{
    ControlCommand, DisplayEntry, EntryBuffer, HttpTailSource, MemoryView, SessionSettings,
    TailCursor, TailDriver, TailSession, TailSource, TailView,
};

// Logging
pub use crate::logger::dual::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
