//! Synchronous driver loop for one tail session.
//!
//! The loop waits on a control channel with a timeout equal to the time left
//! until the session's next cycle (capped by a short tick so shutdown flags
//! are noticed promptly), then runs the cycle. Commands from the front-end
//! arrive on the same channel, so control and fetching never overlap.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, never};

use crate::core::errors::Result;
use crate::logger::dual::{ActivityEvent, ActivityLoggerHandle, SessionTag};

use super::clock::Clock;
use super::session::{CycleOutcome, TailSession};
use super::source::TailSource;
use super::view::{Navigation, TailView};

/// Longest the loop sleeps before re-checking shutdown.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Front-end requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Toggle,
    Navigate(Navigation),
    Quit,
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub cycles: u64,
    pub messages: u64,
    pub evicted: u64,
    pub failures: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    Quit,
    Signal,
    Closed,
    /// A cycle budget given to the driver was used up.
    CycleLimit,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Signal => "signal",
            Self::Closed => "closed",
            Self::CycleLimit => "cycle_limit",
        }
    }
}

pub struct TailDriver<S, V, C> {
    session: TailSession<S, V, C>,
    commands: Receiver<ControlCommand>,
    logger: Option<ActivityLoggerHandle>,
    shutdown: Option<Arc<AtomicBool>>,
    tick: Duration,
    max_cycles: Option<u64>,
}

impl<S: TailSource, V: TailView, C: Clock> TailDriver<S, V, C> {
    pub fn new(session: TailSession<S, V, C>, commands: Receiver<ControlCommand>) -> Self {
        Self {
            session,
            commands,
            logger: None,
            shutdown: None,
            tick: DEFAULT_TICK,
            max_cycles: None,
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Exit when this flag turns true (SIGINT / SIGTERM).
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Stop after this many cycles (skipped cycles count).
    #[must_use]
    pub const fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &TailSession<S, V, C> {
        &self.session
    }

    /// Run until quit, signal, close or cycle budget. Closes the session on exit.
    pub fn run(mut self) -> Result<(DriverSummary, TailSession<S, V, C>)> {
        let tag = SessionTag::from(self.session.cursor());
        let started = Instant::now();
        let mut summary = DriverSummary::default();
        let mut commands = self.commands.clone();
        self.session.view_mut().present()?;

        loop {
            if self.shutdown_requested() {
                summary.reason = StopReason::Signal;
                break;
            }
            if self.session.is_closed() {
                summary.reason = StopReason::Closed;
                break;
            }
            if self
                .max_cycles
                .is_some_and(|limit| summary.cycles >= limit)
            {
                summary.reason = StopReason::CycleLimit;
                break;
            }

            if self.session.is_due() {
                let outcome = self.session.run_cycle();
                summary.cycles += 1;
                self.record(&tag, outcome, &mut summary);
                self.session.view_mut().present()?;
                continue;
            }

            let wait = self
                .session
                .time_until_due()
                .unwrap_or(self.tick)
                .min(self.tick);
            match commands.recv_timeout(wait) {
                Ok(ControlCommand::Quit) => {
                    summary.reason = StopReason::Quit;
                    break;
                }
                Ok(command) => {
                    self.apply(&tag, command);
                    self.session.view_mut().present()?;
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Input source went away; keep tailing until signalled.
                Err(RecvTimeoutError::Disconnected) => commands = never(),
            }
        }

        summary.evicted = self.session.buffer().evicted_total();
        self.session.close();
        self.emit(ActivityEvent::SessionStopped {
            session: tag,
            reason: summary.reason.as_str().to_string(),
            cycles: self.session.cycles(),
            uptime_secs: started.elapsed().as_secs(),
        });
        Ok((summary, self.session))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn apply(&mut self, tag: &SessionTag, command: ControlCommand) {
        let was_active = self.session.is_active();
        match command {
            ControlCommand::Start => self.session.start(),
            ControlCommand::Stop => self.session.stop(),
            ControlCommand::Toggle => {
                self.session.toggle();
            }
            ControlCommand::Navigate(nav) => self.session.view_mut().navigate(nav),
            ControlCommand::Quit => {}
        }
        match (was_active, self.session.is_active()) {
            (true, false) => self.emit(ActivityEvent::Paused {
                session: tag.clone(),
            }),
            (false, true) => self.emit(ActivityEvent::Resumed {
                session: tag.clone(),
            }),
            _ => {}
        }
    }

    fn record(&self, tag: &SessionTag, outcome: CycleOutcome, summary: &mut DriverSummary) {
        match outcome {
            CycleOutcome::Rendered(report) => {
                summary.messages += report.appended as u64;
                if let Some(after_failures) = report.recovered_after {
                    self.emit(ActivityEvent::Recovered {
                        session: tag.clone(),
                        after_failures,
                    });
                }
                if report.appended > 0 {
                    self.emit(ActivityEvent::BatchRendered {
                        session: tag.clone(),
                        messages: report.appended,
                        evicted: report.evicted,
                        duration_ms: u64::try_from(report.fetch_duration.as_millis())
                            .unwrap_or(u64::MAX),
                    });
                }
            }
            CycleOutcome::Failed {
                error,
                consecutive_failures,
                became_stale,
            } => {
                summary.failures += 1;
                self.emit(ActivityEvent::FetchFailed {
                    session: tag.clone(),
                    code: error.code().to_string(),
                    message: error.to_string(),
                    failures: consecutive_failures,
                });
                if became_stale {
                    self.emit(ActivityEvent::BecameStale {
                        session: tag.clone(),
                        failures: consecutive_failures,
                    });
                }
            }
            CycleOutcome::Skipped | CycleOutcome::Abandoned => {}
        }
    }

    fn emit(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}
