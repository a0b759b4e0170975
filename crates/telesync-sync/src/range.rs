//! Query window and generation tracking

use serde::Serialize;
use telesync_core::Timestamp;

use crate::{Result, SyncError};

/// Time range the chart is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
    pub realtime: bool,
}

impl Window {
    pub fn new(start: Timestamp, end: Timestamp, realtime: bool) -> Result<Self> {
        if end <= start {
            return Err(SyncError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            realtime,
        })
    }

    /// `{now - span, now}` in real-time mode
    pub fn live(now: Timestamp, span_ms: i64) -> Result<Self> {
        Self::new(now.saturating_sub(span_ms), now, true)
    }

    pub fn span_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Window plus the generation it was installed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    #[serde(flatten)]
    pub window: Window,
    pub generation: u64,
}

/// Owner of the active window.
///
/// Every replacement bumps the generation; work tagged with an older
/// generation is void. Toggling real-time mode alone is not a replacement.
/// The controller itself is not synchronized: it lives inside the chart
/// state lock so a replacement and the matching chart clear are atomic.
#[derive(Debug)]
pub struct RangeController {
    window: Window,
    generation: u64,
}

impl RangeController {
    pub fn new(initial: Window) -> Self {
        Self {
            window: initial,
            generation: 0,
        }
    }

    pub fn set_window(&mut self, start: Timestamp, end: Timestamp, realtime: bool) -> Result<WindowSnapshot> {
        let window = Window::new(start, end, realtime)?;
        Ok(self.replace(window))
    }

    /// Install an already validated window
    pub fn replace(&mut self, window: Window) -> WindowSnapshot {
        self.window = window;
        self.generation += 1;
        self.current_window()
    }

    pub fn current_window(&self) -> WindowSnapshot {
        WindowSnapshot {
            window: self.window,
            generation: self.generation,
        }
    }

    pub fn set_realtime(&mut self, realtime: bool) {
        self.window.realtime = realtime;
    }

    pub fn is_realtime(&self) -> bool {
        self.window.realtime
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_window_bumps_generation() {
        let mut range = RangeController::new(Window::new(0, 10, false).unwrap());
        assert_eq!(range.generation(), 0);

        let snap = range.set_window(100, 200, true).unwrap();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.window, Window { start: 100, end: 200, realtime: true });
        assert!(range.is_current(1));
        assert!(!range.is_current(0));
    }

    #[test]
    fn test_invalid_range_leaves_window_untouched() {
        let mut range = RangeController::new(Window::new(0, 10, false).unwrap());
        assert!(matches!(
            range.set_window(50, 50, false),
            Err(SyncError::InvalidRange { start: 50, end: 50 })
        ));
        assert!(range.set_window(60, 50, false).is_err());
        assert_eq!(range.current_window().window.end, 10);
        assert_eq!(range.generation(), 0);
    }

    #[test]
    fn test_set_realtime_keeps_generation() {
        let mut range = RangeController::new(Window::new(0, 10, true).unwrap());
        range.set_realtime(false);
        assert!(!range.is_realtime());
        assert_eq!(range.generation(), 0);
    }

    #[test]
    fn test_live_window() {
        let window = Window::live(1_000_000, 300_000).unwrap();
        assert_eq!(window.start, 700_000);
        assert_eq!(window.span_ms(), 300_000);
        assert!(window.realtime);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snap = RangeController::new(Window::new(1, 2, true).unwrap()).current_window();
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json, serde_json::json!({"start": 1, "end": 2, "realtime": true, "generation": 0}));
    }
}
