//! ATM-centered display windowing.

use crate::models::{Strike, StrikeRow};
use serde::Serialize;
use std::ops::Range;

/// Window size of the straddle view: 15 strikes either side of ATM.
pub const STRADDLE_WINDOW_SIZE: usize = 31;

/// What the window was centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowCenter {
    /// The ATM strike, or the strike nearest to it.
    Atm,
    /// No ATM known, middle of the strike list.
    GeometricMedian,
}

/// A contiguous slice of the chain selected for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayWindow {
    /// First row index, inclusive.
    pub start: usize,
    /// Last row index, exclusive.
    pub end: usize,
    /// Index the window was centered on, `None` for an empty chain.
    pub center_index: Option<usize>,
    /// Centering rule used.
    pub center: WindowCenter,
    /// Renderer should scroll the viewport to the center row. Raised once
    /// per selector lifetime.
    pub should_center_viewport: bool,
}

impl DisplayWindow {
    /// Returns the row index range.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of rows in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True if the window holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the windowed rows of a strike list.
    #[must_use]
    pub fn rows<'a>(&self, strikes: &'a [StrikeRow]) -> &'a [StrikeRow] {
        strikes.get(self.range()).unwrap_or(&[])
    }
}

/// Computes `[start, end)` of a window of `size` rows centered on `center`
/// within a list of `len` rows, clamped at both ends.
#[must_use]
pub fn window_bounds(len: usize, center: usize, size: usize) -> Range<usize> {
    let mut start = center.saturating_sub(size / 2);
    let mut end = start + size;

    if end > len {
        let overflow = end - len;
        end = len;
        start = start.saturating_sub(overflow);
    }

    start..end
}

/// Index of the row whose strike is numerically nearest to `target`. An
/// exact match wins; equidistant neighbours resolve to the lower strike.
#[must_use]
pub fn nearest_index(rows: &[StrikeRow], target: Strike) -> Option<usize> {
    if rows.is_empty() {
        return None;
    }

    match rows.binary_search_by_key(&target, |row| row.strike) {
        Ok(index) => Some(index),
        Err(0) => Some(0),
        Err(index) if index >= rows.len() => Some(rows.len() - 1),
        Err(index) => {
            let below = rows[index - 1].strike.distance(target);
            let above = rows[index].strike.distance(target);
            Some(if above < below { index } else { index - 1 })
        }
    }
}

/// Selects the display window and tracks the one-shot centering signal.
#[derive(Debug, Clone)]
pub struct DisplayWindowSelector {
    window_size: usize,
    centered: bool,
}

impl DisplayWindowSelector {
    /// Creates a selector for windows of `window_size` rows.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            centered: false,
        }
    }

    /// True once the centering signal has been raised.
    #[must_use]
    pub fn has_centered(&self) -> bool {
        self.centered
    }

    /// Re-arms the centering signal for a new view.
    pub fn reset(&mut self) {
        self.centered = false;
    }

    /// Selects the window for ascending `rows` around `atm`.
    pub fn select(&mut self, rows: &[StrikeRow], atm: Option<Strike>) -> DisplayWindow {
        let (center_index, center) = match atm.and_then(|strike| nearest_index(rows, strike)) {
            Some(index) => (Some(index), WindowCenter::Atm),
            None if rows.is_empty() => (None, WindowCenter::GeometricMedian),
            None => (Some(rows.len() / 2), WindowCenter::GeometricMedian),
        };

        let range = center_index
            .map(|index| window_bounds(rows.len(), index, self.window_size))
            .unwrap_or(0..0);

        let should_center_viewport = !range.is_empty() && !self.centered;
        if should_center_viewport {
            self.centered = true;
        }

        DisplayWindow {
            start: range.start,
            end: range.end,
            center_index,
            center,
            should_center_viewport,
        }
    }
}

impl Default for DisplayWindowSelector {
    fn default() -> Self {
        Self::new(STRADDLE_WINDOW_SIZE)
    }
}
