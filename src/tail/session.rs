//! Tail session: fetch, render, reschedule.
//!
//! A session owns its source, its view and a bounded buffer of display
//! entries. Each call to [`TailSession::run_cycle`] performs at most one
//! fetch, renders the result and schedules the next cycle one poll interval
//! after the cycle *completed*. A slow server therefore pushes the schedule
//! out instead of piling requests up, and `&mut self` keeps a second fetch
//! from starting while one is outstanding.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::config::TailConfig;
use crate::core::errors::TtvError;

use super::buffer::EntryBuffer;
use super::clock::{Clock, SystemClock};
use super::entry::DisplayEntry;
use super::source::{TailCursor, TailSource};
use super::view::TailView;

pub const STATUS_ACTIVE: &str = "Topic tailer: active";
pub const STATUS_STOPPED: &str = "Topic tailer: stopped";

// ──────────────────── settings ────────────────────

/// Session knobs, usually derived from [`TailConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub max_entries: usize,
    pub max_payload_length: usize,
    pub bottom_tolerance: usize,
    pub stale_after_failures: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&TailConfig::default())
    }
}

impl From<&TailConfig> for SessionSettings {
    fn from(config: &TailConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_entries: config.max_entries,
            max_payload_length: config.max_payload_length,
            bottom_tolerance: config.bottom_tolerance,
            stale_after_failures: config.stale_after_failures,
        }
    }
}

// ──────────────────── state ────────────────────

/// Scheduling state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created; the first cycle is due immediately.
    Idle,
    /// A fetch is outstanding.
    Fetching,
    /// Next cycle is due at `due`.
    Scheduled { due: Instant },
    /// Torn down. No further cycles run.
    Closed,
}

/// Cloneable close switch for a session, usable from other threads.
///
/// Closing is one-way. A fetch that completes after the close is discarded
/// without touching the view.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// What a single cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Session is stopped; no fetch was made.
    Skipped,
    /// A batch was fetched and rendered.
    Rendered(RenderReport),
    /// The fetch failed; buffer and view are unchanged.
    Failed {
        error: TtvError,
        consecutive_failures: u32,
        /// This failure crossed the staleness threshold.
        became_stale: bool,
    },
    /// The session was closed; any fetched data was discarded.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub appended: usize,
    pub evicted: usize,
    pub scrolled: bool,
    /// Set when this batch ended a stale streak of this many failures.
    pub recovered_after: Option<u32>,
    pub fetch_duration: Duration,
}

// ──────────────────── session ────────────────────

pub struct TailSession<S, V, C = SystemClock> {
    cursor: TailCursor,
    source: S,
    view: V,
    clock: C,
    settings: SessionSettings,
    buffer: EntryBuffer,
    active: bool,
    phase: Phase,
    handle: SessionHandle,
    consecutive_failures: u32,
    cycles: u64,
    last_error: Option<String>,
}

impl<S: TailSource, V: TailView> TailSession<S, V, SystemClock> {
    pub fn new(cursor: TailCursor, source: S, view: V, settings: SessionSettings) -> Self {
        Self::with_clock(cursor, source, view, SystemClock, settings)
    }
}

impl<S: TailSource, V: TailView, C: Clock> TailSession<S, V, C> {
    /// New active session. The first cycle is due immediately.
    pub fn with_clock(
        cursor: TailCursor,
        source: S,
        view: V,
        clock: C,
        settings: SessionSettings,
    ) -> Self {
        let mut session = Self {
            cursor,
            source,
            view,
            clock,
            buffer: EntryBuffer::new(settings.max_entries),
            settings,
            active: true,
            phase: Phase::Idle,
            handle: SessionHandle::new(),
            consecutive_failures: 0,
            cycles: 0,
            last_error: None,
        };
        session.publish_status();
        session
    }

    /// Start in the stopped state.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.stop();
        self
    }

    // ── control surface ──

    /// Resume fetching from the next cycle on, with the same cursor.
    pub fn start(&mut self) {
        self.active = true;
        self.publish_status();
    }

    /// Stop fetching from the next cycle on. An in-flight fetch still renders.
    pub fn stop(&mut self) {
        self.active = false;
        self.publish_status();
    }

    /// Flip between started and stopped; returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.active {
            self.stop();
        } else {
            self.start();
        }
        self.active
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Close the session. Nothing runs afterwards.
    pub fn close(&mut self) {
        self.handle.close();
        self.phase = Phase::Closed;
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed || self.handle.is_closed()
    }

    /// `"Topic tailer: active"` or `"Topic tailer: stopped"`, plus a staleness
    /// note after too many consecutive failed fetches.
    #[must_use]
    pub fn status_label(&self) -> String {
        let base = if self.active {
            STATUS_ACTIVE
        } else {
            STATUS_STOPPED
        };
        if self.is_stale() {
            format!(
                "{base} (stale: {} failed fetches)",
                self.consecutive_failures
            )
        } else {
            base.to_string()
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.consecutive_failures >= self.settings.stale_after_failures
    }

    // ── scheduling ──

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a cycle should run now.
    #[must_use]
    pub fn is_due(&self) -> bool {
        if self.handle.is_closed() {
            return false;
        }
        match self.phase {
            Phase::Idle => true,
            Phase::Scheduled { due } => self.clock.now() >= due,
            Phase::Fetching | Phase::Closed => false,
        }
    }

    /// Time left until the next cycle; zero when due, `None` once closed.
    #[must_use]
    pub fn time_until_due(&self) -> Option<Duration> {
        if self.handle.is_closed() {
            return None;
        }
        match self.phase {
            Phase::Idle => Some(Duration::ZERO),
            Phase::Scheduled { due } => Some(due.saturating_duration_since(self.clock.now())),
            Phase::Fetching | Phase::Closed => None,
        }
    }

    /// Run one cycle: fetch (when active), render, reschedule.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.is_closed() {
            self.phase = Phase::Closed;
            return CycleOutcome::Abandoned;
        }
        self.cycles += 1;

        if !self.active {
            self.schedule_next();
            return CycleOutcome::Skipped;
        }

        self.phase = Phase::Fetching;
        let started = self.clock.now();
        let result = self.source.fetch(&self.cursor);
        let fetch_duration = self.clock.now().saturating_duration_since(started);

        if self.handle.is_closed() {
            self.phase = Phase::Closed;
            return CycleOutcome::Abandoned;
        }

        let outcome = match result {
            Ok(batch) => {
                let recovered_after = self.is_stale().then_some(self.consecutive_failures);
                self.consecutive_failures = 0;
                self.last_error = None;
                let entries: Vec<DisplayEntry> = batch
                    .iter()
                    .map(|raw| DisplayEntry::from_raw(raw, self.settings.max_payload_length))
                    .collect();
                let mut report = self.render(&entries);
                report.recovered_after = recovered_after;
                report.fetch_duration = fetch_duration;
                if recovered_after.is_some() {
                    self.publish_status();
                }
                CycleOutcome::Rendered(report)
            }
            Err(error) => {
                let was_stale = self.is_stale();
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_error = Some(error.to_string());
                let became_stale = !was_stale && self.is_stale();
                if self.is_stale() {
                    self.publish_status();
                }
                CycleOutcome::Failed {
                    error,
                    consecutive_failures: self.consecutive_failures,
                    became_stale,
                }
            }
        };

        self.schedule_next();
        outcome
    }

    fn render(&mut self, entries: &[DisplayEntry]) -> RenderReport {
        let was_at_bottom = self.view.is_at_bottom(self.settings.bottom_tolerance);
        let evicted = self.buffer.append(entries.iter().cloned());
        self.view.append(entries);
        if evicted > 0 {
            self.view.trim_front(evicted);
        }
        if was_at_bottom {
            self.view.scroll_to_bottom();
        }
        RenderReport {
            appended: entries.len(),
            evicted,
            scrolled: was_at_bottom,
            recovered_after: None,
            fetch_duration: Duration::ZERO,
        }
    }

    fn schedule_next(&mut self) {
        let due = self.clock.now() + self.settings.poll_interval;
        self.phase = Phase::Scheduled { due };
    }

    fn publish_status(&mut self) {
        let label = self.status_label();
        self.view.set_status(&label);
    }

    // ── accessors ──

    #[must_use]
    pub const fn cursor(&self) -> &TailCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn buffer(&self) -> &EntryBuffer {
        &self.buffer
    }

    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    pub const fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Cycles run so far, skipped ones included.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}

// ──────────────────── tests ────────────────────
