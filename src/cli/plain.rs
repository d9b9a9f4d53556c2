//! Line-oriented tail output for pipes and `--plain`.
//!
//! Entries are written as soon as they are appended, so the view is always
//! at its end. Status changes go to stderr to keep stdout machine-readable.

#![allow(missing_docs)]

use std::io::Write;

use crate::core::errors::{Result, TtvError};
use crate::tail::entry::DisplayEntry;
use crate::tail::view::TailView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    Text,
    Json,
}

pub struct PlainView<W: Write> {
    out: W,
    format: LineFormat,
    status: String,
    announce_status: bool,
    written: u64,
    failed: Option<String>,
}

impl<W: Write> PlainView<W> {
    pub fn new(out: W, format: LineFormat) -> Self {
        Self {
            out,
            format,
            status: String::new(),
            announce_status: true,
            written: 0,
            failed: None,
        }
    }

    /// Suppress status lines on stderr.
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.announce_status = false;
        self
    }

    pub const fn written(&self) -> u64 {
        self.written
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_entry(&mut self, entry: &DisplayEntry) -> std::io::Result<()> {
        match self.format {
            LineFormat::Text => writeln!(self.out, "{}", text_line(entry)),
            LineFormat::Json => {
                serde_json::to_writer(&mut self.out, entry)?;
                writeln!(self.out)
            }
        }
    }
}

/// `<timestamp> [p<partition>@<offset>] <key> <payload>`.
pub fn text_line(entry: &DisplayEntry) -> String {
    match entry.position() {
        Some(position) => format!(
            "{} {} {} {}",
            entry.timestamp_label, position, entry.key, entry.payload
        ),
        None => format!("{} {} {}", entry.timestamp_label, entry.key, entry.payload),
    }
}

impl<W: Write> TailView for PlainView<W> {
    fn bottom_gap(&self) -> usize {
        0
    }

    fn scroll_to_bottom(&mut self) {}

    fn append(&mut self, entries: &[DisplayEntry]) {
        if self.failed.is_some() {
            return;
        }
        for entry in entries {
            if let Err(e) = self.write_entry(entry) {
                self.failed = Some(e.to_string());
                return;
            }
            self.written += 1;
        }
    }

    // Lines already written stay written.
    fn trim_front(&mut self, _count: usize) {}

    fn set_status(&mut self, label: &str) {
        if self.status == label {
            return;
        }
        label.clone_into(&mut self.status);
        if self.announce_status {
            eprintln!("[TTV-TAIL] {label}");
        }
    }

    fn present(&mut self) -> Result<()> {
        if let Some(details) = self.failed.take() {
            return Err(TtvError::Runtime {
                details: format!("write tail output: {details}"),
            });
        }
        self.out.flush().map_err(|e| TtvError::Runtime {
            details: format!("flush tail output: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, payload: &str) -> DisplayEntry {
        DisplayEntry {
            key: key.to_string(),
            timestamp_label: "2023-11-14T22:13:20.000Z Created".to_string(),
            payload: payload.to_string(),
            partition: None,
            offset: None,
        }
    }

    #[test]
    fn text_lines_in_order() {
        let mut view = PlainView::new(Vec::new(), LineFormat::Text).quiet();
        view.append(&[entry("a", "one"), entry("b", "two")]);
        view.present().unwrap();
        assert_eq!(view.written(), 2);
        let out = String::from_utf8(view.into_inner()).unwrap();
        assert_eq!(
            out,
            "2023-11-14T22:13:20.000Z Created a one\n2023-11-14T22:13:20.000Z Created b two\n"
        );
    }

    #[test]
    fn json_lines_are_self_contained() {
        let mut view = PlainView::new(Vec::new(), LineFormat::Json).quiet();
        let mut e = entry("k", "{\"x\":1}");
        e.partition = Some(0);
        e.offset = Some(7);
        view.append(&[e]);
        let out = String::from_utf8(view.into_inner()).unwrap();
        let line: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(line["key"], "k");
        assert_eq!(line["payload"], "{\"x\":1}");
        assert_eq!(line["offset"], 7);
    }

    #[test]
    fn always_at_bottom() {
        let mut view = PlainView::new(Vec::new(), LineFormat::Text).quiet();
        view.append(&[entry("a", "1")]);
        assert!(view.is_at_bottom(0));
    }

    #[test]
    fn status_changes_are_tracked() {
        let mut view = PlainView::new(Vec::new(), LineFormat::Text).quiet();
        view.set_status("Topic tailer: stopped");
        assert_eq!(view.status(), "Topic tailer: stopped");
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_surfaces_on_present() {
        let mut view = PlainView::new(Broken, LineFormat::Text).quiet();
        view.append(&[entry("a", "1")]);
        let err = view.present().unwrap_err();
        assert_eq!(err.code(), "TTV-3900");
        assert!(view.present().is_ok());
    }
}
