//! Frames-per-second bookkeeping for the frame loop.

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts ticks and publishes an average once per elapsed second.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    window_start: Option<Instant>,
    last_tick: Option<Instant>,
    last_delta: Duration,
    count: u32,
    average: u32,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame finishing at `now`.
    ///
    /// Returns the new per-second average when this tick closes a window.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        if let Some(last) = self.last_tick {
            self.last_delta = now.saturating_duration_since(last);
        }
        self.last_tick = Some(now);
        self.count += 1;

        let start = *self.window_start.get_or_insert(now);
        if now.saturating_duration_since(start) < WINDOW {
            return None;
        }
        self.average = self.count;
        self.count = 0;
        self.window_start = Some(now);
        Some(self.average)
    }

    /// Ticks in the most recently closed window; 0 until one closes.
    pub fn average(&self) -> u32 {
        self.average
    }

    /// Time between the two most recent ticks.
    pub fn last_delta(&self) -> Duration {
        self.last_delta
    }
}
