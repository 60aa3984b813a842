//! Driver state tracking

use serde::{Deserialize, Serialize};

/// Per-session eye-closure accumulator.
///
/// Owned by the caller and passed into every tracker call; reset at the
/// start of each monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrowsinessState {
    closed_frames: u32,
    frame_rate_hz: f64,
}

impl Default for DrowsinessState {
    fn default() -> Self {
        Self::new(30.0)
    }
}

impl DrowsinessState {
    pub fn new(frame_rate_hz: f64) -> Self {
        Self {
            closed_frames: 0,
            frame_rate_hz,
        }
    }

    /// Consecutive frames in which the eyes were judged closed
    pub fn closed_frame_count(&self) -> u32 {
        self.closed_frames
    }

    /// Closed frame count converted to seconds
    pub fn closed_duration_secs(&self) -> f64 {
        if self.frame_rate_hz > 0.0 {
            self.closed_frames as f64 / self.frame_rate_hz
        } else {
            0.0
        }
    }

    pub fn frame_rate_hz(&self) -> f64 {
        self.frame_rate_hz
    }

    pub(crate) fn record_closed(&mut self) {
        self.closed_frames = self.closed_frames.saturating_add(1);
    }

    /// Record an open observation; returns the closed run it ended
    pub(crate) fn record_open(&mut self) -> u32 {
        std::mem::take(&mut self.closed_frames)
    }

    /// Reset state (on session start)
    pub fn reset(&mut self) {
        self.closed_frames = 0;
    }
}
