//! Full-screen live tail: status header, scrolling entries, key help footer.
//!
//! Uses `crossterm` for raw terminal manipulation (alternate screen, cursor
//! positioning, color output). Keyboard input is read on its own thread and
//! forwarded to the tail driver as [`ControlCommand`]s; the driver calls
//! [`TailView::present`] after every change, which redraws the frame.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::core::errors::{Result, TtvError};
use crate::tail::driver::ControlCommand;
use crate::tail::entry::DisplayEntry;
use crate::tail::session::STATUS_ACTIVE;
use crate::tail::view::{Navigation, ScrollViewport, TailView};

/// Header and footer rows around the entry area.
const CHROME_ROWS: usize = 3;

const FOOTER: &str = " s start  p stop  space toggle  ↑↓ PgUp PgDn Home End scroll  q quit ";

// ──────────────────── key mapping ────────────────────

/// Translate a key press into a driver command.
pub fn map_key(key: KeyEvent) -> Option<ControlCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            ControlCommand::Quit
        }
        KeyCode::Char('q') | KeyCode::Esc => ControlCommand::Quit,
        KeyCode::Char('s') => ControlCommand::Start,
        KeyCode::Char('p') => ControlCommand::Stop,
        KeyCode::Char(' ') => ControlCommand::Toggle,
        KeyCode::Up | KeyCode::Char('k') => ControlCommand::Navigate(Navigation::LineUp(1)),
        KeyCode::Down | KeyCode::Char('j') => ControlCommand::Navigate(Navigation::LineDown(1)),
        KeyCode::PageUp => ControlCommand::Navigate(Navigation::PageUp),
        KeyCode::PageDown => ControlCommand::Navigate(Navigation::PageDown),
        KeyCode::Home | KeyCode::Char('g') => ControlCommand::Navigate(Navigation::Home),
        KeyCode::End | KeyCode::Char('G') => ControlCommand::Navigate(Navigation::End),
        _ => return None,
    };
    Some(command)
}

/// Visible entry rows for a terminal of `rows` lines.
pub fn body_rows(rows: u16) -> usize {
    (rows as usize).saturating_sub(CHROME_ROWS).max(1)
}

/// Read terminal events until `stop` is set or the driver hangs up.
pub fn spawn_input(commands: Sender<ControlCommand>, stop: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("ttv-input".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let ready = match event::poll(Duration::from_millis(50)) {
                    Ok(ready) => ready,
                    Err(e) => {
                        eprintln!("[TTV-INPUT] terminal poll failed: {e}");
                        return;
                    }
                };
                if !ready {
                    continue;
                }
                let command = match event::read() {
                    Ok(Event::Key(key)) => map_key(key),
                    Ok(Event::Resize(_, rows)) => {
                        Some(ControlCommand::Navigate(Navigation::Resize(body_rows(rows))))
                    }
                    Ok(_) => None,
                    Err(e) => {
                        eprintln!("[TTV-INPUT] terminal read failed: {e}");
                        return;
                    }
                };
                if let Some(command) = command
                    && commands.send(command).is_err()
                {
                    return;
                }
            }
        })
        .map_err(|e| TtvError::Runtime {
            details: format!("failed to spawn input thread: {e}"),
        })
}

// ──────────────────── line rendering ────────────────────

/// One entry as a single screen line, cut to `width` characters.
pub fn entry_line(entry: &DisplayEntry, width: usize) -> String {
    let mut line = entry.timestamp_label.clone();
    line.push_str("  ");
    if let Some(position) = entry.position() {
        line.push_str(&position);
        line.push_str("  ");
    }
    line.push_str(&entry.key);
    line.push_str("  ");
    // Payloads may span lines; the screen shows one row per entry.
    line.extend(entry.payload.chars().map(|c| if c.is_control() { ' ' } else { c }));
    clip(&line, width)
}

fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

// ──────────────────── terminal view ────────────────────

/// Alternate-screen view. Restores the terminal on drop.
pub struct TerminalView {
    out: io::Stdout,
    title: String,
    entries: VecDeque<DisplayEntry>,
    viewport: ScrollViewport,
    status: String,
    width: usize,
    dirty: bool,
    restored: bool,
}

impl TerminalView {
    /// Enter raw mode and the alternate screen.
    pub fn enter(title: impl Into<String>) -> Result<Self> {
        let mut out = io::stdout();
        let (cols, rows) = terminal::size().map_err(|e| terminal_error("size", &e))?;
        terminal::enable_raw_mode().map_err(|e| terminal_error("raw mode", &e))?;
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(terminal_error("alternate screen", &e));
        }
        Ok(Self {
            out,
            title: title.into(),
            entries: VecDeque::new(),
            viewport: ScrollViewport::new(body_rows(rows)),
            status: STATUS_ACTIVE.to_string(),
            width: usize::from(cols),
            dirty: true,
            restored: false,
        })
    }

    /// Leave the alternate screen. Safe to call more than once.
    pub fn restore(&mut self) -> bool {
        if self.restored {
            return true;
        }
        self.restored = true;
        let screen = execute!(self.out, Show, LeaveAlternateScreen).is_ok();
        let raw = terminal::disable_raw_mode().is_ok();
        screen && raw
    }

    fn draw(&mut self) -> io::Result<()> {
        let width = self.width.max(1);
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::All))?;

        let status_color = if self.status.starts_with(STATUS_ACTIVE) {
            Color::Green
        } else {
            Color::Yellow
        };
        queue!(
            self.out,
            MoveTo(0, 0),
            SetForegroundColor(Color::Cyan),
            SetAttribute(Attribute::Bold),
        )?;
        write!(self.out, "{}", clip(&format!(" {} ", self.title), width))?;
        queue!(self.out, SetForegroundColor(status_color))?;
        let used = self.title.chars().count() + 2;
        write!(self.out, "{}", clip(&self.status, width.saturating_sub(used)))?;
        queue!(self.out, SetAttribute(Attribute::Reset))?;

        let range = self.viewport.visible();
        let first = range.start;
        for (offset, entry) in self.entries.range(range).enumerate() {
            let row = (offset + 1) as u16;
            queue!(self.out, MoveTo(0, row))?;
            write!(self.out, "{}", entry_line(entry, width))?;
        }

        let footer_row = (self.viewport.height + 1) as u16;
        let position = format!(
            " {}-{} of {} ",
            (first + 1).min(self.entries.len()),
            self.viewport.visible().end,
            self.entries.len()
        );
        queue!(self.out, MoveTo(0, footer_row), SetForegroundColor(Color::DarkGrey))?;
        write!(
            self.out,
            "{}",
            clip(&format!("{FOOTER}{position}"), width)
        )?;
        queue!(self.out, SetAttribute(Attribute::Reset))?;
        self.out.flush()
    }
}

impl TailView for TerminalView {
    fn bottom_gap(&self) -> usize {
        self.viewport.bottom_gap()
    }

    fn scroll_to_bottom(&mut self) {
        self.viewport.scroll_to_bottom();
        self.dirty = true;
    }

    fn append(&mut self, entries: &[DisplayEntry]) {
        self.entries.extend(entries.iter().cloned());
        self.viewport.grow(entries.len());
        self.dirty = true;
    }

    fn trim_front(&mut self, count: usize) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
        self.viewport.shrink_front(count);
        self.dirty = true;
    }

    fn set_status(&mut self, label: &str) {
        if self.status != label {
            label.clone_into(&mut self.status);
            self.dirty = true;
        }
    }

    fn navigate(&mut self, nav: Navigation) {
        if let Navigation::Resize(_) = nav
            && let Ok((cols, _)) = terminal::size()
        {
            self.width = usize::from(cols);
        }
        self.viewport.apply(nav);
        self.dirty = true;
    }

    fn present(&mut self) -> Result<()> {
        if !self.dirty || self.restored {
            return Ok(());
        }
        self.dirty = false;
        self.draw().map_err(|e| terminal_error("draw", &e))
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        self.restore();
    }
}

fn terminal_error(step: &str, e: &io::Error) -> TtvError {
    TtvError::Runtime {
        details: format!("terminal {step} failed: {e}"),
    }
}

// ──────────────────── tests ────────────────────
