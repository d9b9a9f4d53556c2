//! Signal handling: SIGTERM/SIGINT request shutdown of the running session.
//!
//! Uses the `signal-hook` crate for safe signal registration. The tail
//! driver polls the shared flag between cycles; [`SignalHandler::forward_to`]
//! additionally closes a session through its handle so a fetch that is in
//! flight when the signal lands is discarded instead of rendered.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{Result, TtvError};
use crate::tail::session::SessionHandle;

// ──────────────────── signal handler ────────────────────

/// Shutdown state shared between the signal hooks and the tail loop.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register SIGTERM / SIGINT.
    ///
    /// Registration is best-effort; failures are reported on stderr.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// A handler that only reacts to [`Self::request_shutdown`].
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// The raw flag, for loops that poll it directly.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_flag)
    }

    /// Close `session` once shutdown is requested or `done` turns true.
    ///
    /// The watcher polls every `poll`; it exits as soon as either flag is set.
    pub fn forward_to(
        &self,
        session: SessionHandle,
        done: Arc<AtomicBool>,
        poll: Duration,
    ) -> Result<JoinHandle<()>> {
        let flag = Arc::clone(&self.shutdown_flag);
        std::thread::Builder::new()
            .name("ttv-signal".to_string())
            .spawn(move || {
                loop {
                    if flag.load(Ordering::Relaxed) {
                        session.close();
                        return;
                    }
                    if done.load(Ordering::Relaxed) {
                        return;
                    }
                    std::thread::sleep(poll);
                }
            })
            .map_err(|e| TtvError::Runtime {
                details: format!("failed to spawn signal watcher: {e}"),
            })
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[TTV-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[TTV-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── shutdown coordinator ────────────────────

/// Runs named teardown steps in order, bounded by a timeout.
pub struct ShutdownCoordinator {
    pub timeout: Duration,
    /// Print one line per step to stderr.
    pub verbose: bool,
}

impl ShutdownCoordinator {
    /// Default 5-second budget.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            verbose: false,
        }
    }

    /// Returns `true` when every step succeeded within the timeout.
    pub fn execute(&self, steps: &mut [(&str, &mut dyn FnMut() -> bool)]) -> bool {
        let start = Instant::now();
        let mut all_ok = true;

        for (name, step) in steps.iter_mut() {
            if start.elapsed() > self.timeout {
                eprintln!("[TTV-SHUTDOWN] timeout reached, abandoning remaining steps");
                return false;
            }

            let ok = step();
            if !ok {
                eprintln!("[TTV-SHUTDOWN] {name}: failed");
                all_ok = false;
            } else if self.verbose {
                eprintln!("[TTV-SHUTDOWN] {name}: ok");
            }
        }

        all_ok
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── tests ────────────────────
