//! The rendering surface a tail session drives.
//!
//! A view shows one row per entry. The session only needs to know how far
//! the view is from its end, and to append, trim and snap to the end.

use std::collections::VecDeque;

use crate::core::errors::Result;

use super::entry::DisplayEntry;

/// User-driven scroll movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    LineUp(usize),
    LineDown(usize),
    PageUp,
    PageDown,
    Home,
    End,
    /// Visible height changed to this many rows.
    Resize(usize),
}

/// Capability interface between a [`TailSession`](super::session::TailSession)
/// and whatever renders its entries.
pub trait TailView {
    /// Rows between the last visible row and the last entry.
    fn bottom_gap(&self) -> usize;

    /// Whether the view is within `tolerance` rows of its end.
    fn is_at_bottom(&self, tolerance: usize) -> bool {
        self.bottom_gap() <= tolerance
    }

    fn scroll_to_bottom(&mut self);

    /// Append entries in order after the current last entry.
    fn append(&mut self, entries: &[DisplayEntry]);

    /// Drop the `count` oldest entries.
    fn trim_front(&mut self, count: usize);

    /// New status label (`"Topic tailer: active"` and friends).
    fn set_status(&mut self, _label: &str) {}

    /// Apply a user scroll movement.
    fn navigate(&mut self, _nav: Navigation) {}

    /// Flush pending changes to the output device.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Scroll state over a list of rows.
///
/// `top` is the index of the first visible row. Trimming rows from the front
/// shifts `top` so the same entries stay in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollViewport {
    pub top: usize,
    pub height: usize,
    pub rows: usize,
}

impl ScrollViewport {
    #[must_use]
    pub const fn new(height: usize) -> Self {
        Self {
            top: 0,
            height,
            rows: 0,
        }
    }

    #[must_use]
    pub const fn bottom_gap(&self) -> usize {
        self.rows.saturating_sub(self.top + self.height)
    }

    /// Largest valid `top`.
    #[must_use]
    pub const fn max_top(&self) -> usize {
        self.rows.saturating_sub(self.height)
    }

    pub const fn scroll_to_bottom(&mut self) {
        self.top = self.max_top();
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.top = self.top.saturating_sub(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.top = (self.top + rows).min(self.max_top());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.height.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.height.max(1));
    }

    pub const fn home(&mut self) {
        self.top = 0;
    }

    pub fn resize(&mut self, height: usize) {
        self.height = height;
        self.top = self.top.min(self.max_top());
    }

    pub const fn grow(&mut self, rows: usize) {
        self.rows += rows;
    }

    pub fn shrink_front(&mut self, rows: usize) {
        let rows = rows.min(self.rows);
        self.rows -= rows;
        self.top = self.top.saturating_sub(rows).min(self.max_top());
    }

    pub fn apply(&mut self, nav: Navigation) {
        match nav {
            Navigation::LineUp(rows) => self.scroll_up(rows),
            Navigation::LineDown(rows) => self.scroll_down(rows),
            Navigation::PageUp => self.page_up(),
            Navigation::PageDown => self.page_down(),
            Navigation::Home => self.home(),
            Navigation::End => self.scroll_to_bottom(),
            Navigation::Resize(height) => self.resize(height),
        }
    }

    /// Range of row indices currently visible.
    #[must_use]
    pub fn visible(&self) -> std::ops::Range<usize> {
        let end = (self.top + self.height).min(self.rows);
        self.top.min(end)..end
    }
}

/// Headless view that keeps entries in memory.
///
/// Used for tests and by library consumers that render on their own.
#[derive(Debug, Clone)]
pub struct MemoryView {
    entries: VecDeque<DisplayEntry>,
    viewport: ScrollViewport,
    status: String,
    snaps: usize,
}

impl MemoryView {
    #[must_use]
    pub fn new(height: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            viewport: ScrollViewport::new(height),
            status: String::new(),
            snaps: 0,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &DisplayEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn viewport(&self) -> &ScrollViewport {
        &self.viewport
    }

    pub const fn viewport_mut(&mut self) -> &mut ScrollViewport {
        &mut self.viewport
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Times the session snapped this view to its end.
    #[must_use]
    pub const fn snap_count(&self) -> usize {
        self.snaps
    }
}

impl TailView for MemoryView {
    fn bottom_gap(&self) -> usize {
        self.viewport.bottom_gap()
    }

    fn scroll_to_bottom(&mut self) {
        self.snaps += 1;
        self.viewport.scroll_to_bottom();
    }

    fn append(&mut self, entries: &[DisplayEntry]) {
        self.entries.extend(entries.iter().cloned());
        self.viewport.grow(entries.len());
    }

    fn trim_front(&mut self, count: usize) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
        self.viewport.shrink_front(count);
    }

    fn set_status(&mut self, label: &str) {
        label.clone_into(&mut self.status);
    }

    fn navigate(&mut self, nav: Navigation) {
        self.viewport.apply(nav);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<DisplayEntry> {
        (0..n)
            .map(|i| DisplayEntry {
                key: "N/A".to_string(),
                timestamp_label: "N/A".to_string(),
                payload: i.to_string(),
                partition: None,
                offset: None,
            })
            .collect()
    }

    #[test]
    fn empty_view_is_at_bottom() {
        let view = MemoryView::new(10);
        assert_eq!(view.bottom_gap(), 0);
        assert!(view.is_at_bottom(1));
    }

    #[test]
    fn appending_opens_a_gap_until_snapped() {
        let mut view = MemoryView::new(5);
        view.append(&rows(12));
        assert_eq!(view.bottom_gap(), 7);
        view.scroll_to_bottom();
        assert_eq!(view.bottom_gap(), 0);
        assert_eq!(view.viewport().top, 7);
        assert_eq!(view.snap_count(), 1);
    }

    #[test]
    fn tolerance_is_inclusive() {
        let mut view = MemoryView::new(5);
        view.append(&rows(6));
        assert!(view.is_at_bottom(1));
        assert!(!view.is_at_bottom(0));
    }

    #[test]
    fn trim_front_keeps_same_entries_in_view() {
        let mut view = MemoryView::new(3);
        view.append(&rows(10));
        view.viewport_mut().top = 5;
        view.trim_front(2);
        assert_eq!(view.len(), 8);
        assert_eq!(view.viewport().top, 3);
        let first_visible = view.entries().nth(view.viewport().top).unwrap();
        assert_eq!(first_visible.payload, "5");
    }

    #[test]
    fn trim_more_than_present_empties_view() {
        let mut view = MemoryView::new(3);
        view.append(&rows(2));
        view.trim_front(9);
        assert!(view.is_empty());
        assert_eq!(view.viewport().rows, 0);
        assert_eq!(view.viewport().top, 0);
    }

    #[test]
    fn viewport_navigation_clamps() {
        let mut vp = ScrollViewport::new(4);
        vp.grow(10);
        vp.page_down();
        assert_eq!(vp.top, 4);
        vp.page_down();
        assert_eq!(vp.top, 6);
        vp.scroll_up(100);
        assert_eq!(vp.top, 0);
        vp.scroll_down(2);
        vp.home();
        assert_eq!(vp.top, 0);
        assert_eq!(vp.visible(), 0..4);
        vp.resize(20);
        assert_eq!(vp.top, 0);
        assert_eq!(vp.visible(), 0..10);
    }

    #[test]
    fn navigate_moves_memory_view() {
        let mut view = MemoryView::new(3);
        view.append(&rows(10));
        view.navigate(Navigation::End);
        assert_eq!(view.bottom_gap(), 0);
        view.navigate(Navigation::LineUp(2));
        assert_eq!(view.bottom_gap(), 2);
        view.navigate(Navigation::Home);
        assert_eq!(view.viewport().top, 0);
        view.navigate(Navigation::Resize(12));
        assert_eq!(view.bottom_gap(), 0);
    }

    #[test]
    fn status_is_recorded() {
        let mut view = MemoryView::new(1);
        view.set_status("Topic tailer: active");
        assert_eq!(view.status(), "Topic tailer: active");
    }
}
