#![forbid(unsafe_code)]

//! Topic Tail View (ttv): live tailing of Kafka topics through a dashboard
//! server's HTTP tailer API, plus the magnitude formatting and sort keys its
//! topic and broker tables use.
//!
//! The pieces:
//! 1. **Tail session**: fetch, render into a bounded buffer, reschedule one
//!    poll interval after completion; pausable without losing the cursor
//! 2. **Magnitude formatter**: `1536` → `"1.5 KiB/s"`, `-1` → `"Unknown"`
//! 3. **Activity log**: JSONL plus an optional SQLite mirror, fed by a
//!    background thread
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use topic_tail_view::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use topic_tail_view::format::format_magnitude;
//! use topic_tail_view::tail::{MemoryView, TailSession};
//! ```

pub mod prelude;

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod format;
pub mod logger;
#[cfg(feature = "signals")]
pub mod runtime;
pub mod tail;
