use std::collections::VecDeque;

use crate::config::BeatConfig;

/// Attack/decay envelope driven by bass-band transients.
///
/// Each observed spectrum contributes the average of its lowest bins to a
/// rolling history. A beat fires when that average beats the history mean by
/// `threshold_ratio` and clears `absolute_floor`; the pulse then jumps to
/// `peak` and decays multiplicatively on every frame without a beat.
#[derive(Debug, Clone)]
pub struct BeatTracker {
    config: BeatConfig,
    history: VecDeque<f32>,
    pulse: f32,
}

impl BeatTracker {
    pub fn new(config: BeatConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len.max(1)),
            pulse: 0.0,
            config,
        }
    }

    /// Current pulse intensity.
    pub fn intensity(&self) -> f32 {
        self.pulse
    }

    /// Feeds one spectrum frame and returns the updated intensity.
    pub fn observe(&mut self, spectrum: &[u8]) -> f32 {
        let bass_range = (spectrum.len() as f32 * self.config.bass_fraction).floor() as usize;
        if bass_range == 0 {
            return self.decay();
        }

        let bass_sum: u32 = spectrum[..bass_range.min(spectrum.len())]
            .iter()
            .map(|b| *b as u32)
            .sum();
        let bass_avg = bass_sum as f32 / bass_range as f32;

        self.history.push_back(bass_avg);
        while self.history.len() > self.config.history_len.max(1) {
            self.history.pop_front();
        }
        let mean = self.history.iter().sum::<f32>() / self.history.len() as f32;

        if bass_avg > mean * self.config.threshold_ratio && bass_avg > self.config.absolute_floor {
            tracing::trace!(bass_avg, mean, "beat");
            self.pulse = self.config.peak;
            self.pulse
        } else {
            self.decay()
        }
    }

    /// Advances the envelope by one frame without a new sample.
    pub fn decay(&mut self) -> f32 {
        self.pulse *= self.config.decay;
        if !self.pulse.is_finite() {
            self.pulse = 0.0;
        }
        self.pulse
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.pulse = 0.0;
    }
}

impl Default for BeatTracker {
    fn default() -> Self {
        Self::new(BeatConfig::default())
    }
}
