//! Reveal progress over host frame time.

use serde::{Deserialize, Serialize};

/// Phase of one visualisation session. There is no terminal phase; a session
/// stays in `Steady` until it is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealPhase {
    /// No frame has been seen yet.
    Initializing,
    /// The wipe is sweeping and points are being disclosed.
    Revealing,
    /// Everything is visible; only audio-reactive effects animate.
    Steady,
}

/// Tracks the progressive reveal of the point field.
///
/// Progress is `clamp((now - start) / duration, 0, 1)` where `start` is the
/// time of the first frame. It never moves backwards, even if the host hands
/// in an earlier timestamp.
#[derive(Debug, Clone)]
pub struct RevealTimeline {
    duration_ms: f64,
    start_ms: Option<f64>,
    progress: f32,
}

impl RevealTimeline {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            start_ms: None,
            progress: 0.0,
        }
    }

    pub fn phase(&self) -> RevealPhase {
        match self.start_ms {
            None => RevealPhase::Initializing,
            Some(_) if self.progress < 1.0 => RevealPhase::Revealing,
            Some(_) => RevealPhase::Steady,
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Milliseconds since the first frame, or zero before it.
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        self.start_ms.map(|start| (now_ms - start).max(0.0)).unwrap_or(0.0)
    }

    /// Moves the timeline to `now_ms` and returns the load progress.
    /// Non-finite timestamps leave the timeline untouched.
    pub fn advance(&mut self, now_ms: f64) -> f32 {
        if !now_ms.is_finite() {
            return self.progress;
        }

        let start = *self.start_ms.get_or_insert(now_ms);
        let raw = if self.duration_ms > 0.0 && self.duration_ms.is_finite() {
            ((now_ms - start) / self.duration_ms).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        self.progress = self.progress.max(raw);
        self.progress
    }

    /// Starts over from `Initializing`, e.g. when a new field is loaded.
    pub fn restart(&mut self) {
        self.start_ms = None;
        self.progress = 0.0;
    }
}
