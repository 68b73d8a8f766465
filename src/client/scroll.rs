//! Throttled scroll position reporting for infinite-scroll views.
//!
//! [`ScrollThrottle`] is fed every raw scroll event and decides which of them
//! reach the consumer: the first event of a burst is reported right away,
//! later ones are held back and the most recent is released once the window
//! has passed.

use serde::Serialize;
use std::time::{Duration, Instant};

pub const THROTTLE_WINDOW: Duration = Duration::from_millis(200);
/// Remaining scrollable distance below which the view counts as at the bottom.
pub const BOTTOM_THRESHOLD: f64 = 1000.0;

/// Raw geometry of the scrolled element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn at_bottom(&self) -> bool {
        self.scroll_height - self.scroll_top - self.client_height < BOTTOM_THRESHOLD
    }

    pub fn position(&self) -> ScrollPosition {
        ScrollPosition {
            current_scroll_position: self.scroll_top,
            at_bottom: self.at_bottom(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPosition {
    pub current_scroll_position: f64,
    pub at_bottom: bool,
}

#[derive(Debug, Clone)]
pub struct ScrollThrottle {
    window: Duration,
    last_emit: Option<Instant>,
    pending: Option<ScrollMetrics>,
    current: Option<f64>,
}

impl Default for ScrollThrottle {
    fn default() -> Self {
        Self::new(THROTTLE_WINDOW)
    }
}

impl ScrollThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: None,
            pending: None,
            current: None,
        }
    }

    /// Records a scroll event. Returns the position to report now, if the
    /// window allows it; otherwise the event is kept for [`Self::poll`].
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> Option<ScrollPosition> {
        if self.window_open(now) {
            self.pending = None;
            return Some(self.emit(metrics, now));
        }
        self.pending = Some(metrics);
        None
    }

    /// Releases the held-back event once the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ScrollPosition> {
        if !self.window_open(now) {
            return None;
        }
        let metrics = self.pending.take()?;
        Some(self.emit(metrics, now))
    }

    /// When the held-back event becomes due, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.pending, self.last_emit) {
            (Some(_), Some(last)) => Some(last + self.window),
            _ => None,
        }
    }

    /// Forgets the window and any held-back event, as when the listener is
    /// re-attached to a different element or callback. The last reported
    /// position is kept.
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }

    /// Last position handed to the consumer.
    pub fn current_scroll_position(&self) -> Option<f64> {
        self.current
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        }
    }

    fn emit(&mut self, metrics: ScrollMetrics, now: Instant) -> ScrollPosition {
        self.last_emit = Some(now);
        self.current = Some(metrics.scroll_top);
        metrics.position()
    }
}
