//! Audio amplitude plumbing.
//!
//! The render loop never waits on audio. A producer (decoder, capture
//! callback, test) pushes PCM into a [`SpectrumTap`], which publishes the
//! latest byte spectrum into a shared [`SpectrumSlot`]. The engine polls the
//! slot through [`AmplitudeSource`] once per frame and uses whatever is there.

mod beat;

use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::AudioConfig, MatrixError, Result};

pub use beat::BeatTracker;

/// Non-blocking source of frequency-domain magnitudes on a 0-255 scale.
pub trait AmplitudeSource {
    /// Copies the most recent spectrum into `out`. Returns `false` when no
    /// sample is available; `out` is left untouched in that case.
    fn poll(&mut self, out: &mut Vec<u8>) -> bool;
}

/// Shared holder for the latest published spectrum.
#[derive(Clone, Default)]
pub struct SpectrumSlot {
    shared: Arc<Mutex<Option<Vec<u8>>>>,
}

impl SpectrumSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored spectrum.
    pub fn publish(&self, bins: &[u8]) -> Result<()> {
        let mut slot = self.lock()?;
        match slot.as_mut() {
            Some(existing) => {
                existing.clear();
                existing.extend_from_slice(bins);
            }
            None => *slot = Some(bins.to_vec()),
        }
        Ok(())
    }

    /// Drops the stored spectrum, e.g. when playback stops.
    pub fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Vec<u8>>>> {
        self.shared
            .lock()
            .map_err(|_| MatrixError::msg("spectrum slot has been poisoned"))
    }
}

impl AmplitudeSource for SpectrumSlot {
    fn poll(&mut self, out: &mut Vec<u8>) -> bool {
        // Contended or poisoned reads count as "no audio"; the frame never waits.
        let Ok(slot) = self.shared.try_lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(bins) => {
                out.clear();
                out.extend_from_slice(bins);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SpectrumSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumSlot").finish()
    }
}

/// Converts PCM blocks into an analyser-style byte spectrum: Blackman
/// window, magnitudes normalised by the FFT size, exponential smoothing over
/// time, then a decibel range mapped onto 0-255.
pub struct SpectrumTap {
    config: AudioConfig,
    slot: SpectrumSlot,
    window: Vec<f32>,
    history: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    fft: FftResources,
}

impl SpectrumTap {
    pub fn new(config: AudioConfig) -> Result<Self> {
        Self::with_slot(config, SpectrumSlot::new())
    }

    /// Creates a tap that publishes into an existing slot.
    pub fn with_slot(config: AudioConfig, slot: SpectrumSlot) -> Result<Self> {
        let size = config.fft_size;
        if size < 32 || size % 2 != 0 {
            return Err(MatrixError::InvalidInput(
                "fft size must be an even number of at least 32 samples",
            ));
        }
        if config.max_decibels <= config.min_decibels {
            return Err(MatrixError::InvalidInput(
                "max decibels must exceed min decibels",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let fft = FftResources {
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        };

        Ok(Self {
            window: (0..size).map(|i| blackman_value(i, size)).collect(),
            history: vec![0.0; size],
            smoothed: vec![0.0; size / 2],
            bytes: vec![0; size / 2],
            slot,
            config,
            fft,
        })
    }

    /// Handle the render engine polls.
    pub fn slot(&self) -> SpectrumSlot {
        self.slot.clone()
    }

    /// Number of frequency bins in each published spectrum.
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Latest computed spectrum.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Feeds mono samples, recomputes the spectrum over the most recent
    /// `fft_size` samples and publishes it.
    pub fn push_samples(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let size = self.history.len();
        let fresh = samples.len().min(size);
        self.history.rotate_left(fresh);
        let tail = &samples[samples.len() - fresh..];
        for (dst, src) in self.history[size - fresh..].iter_mut().zip(tail) {
            *dst = if src.is_finite() { *src } else { 0.0 };
        }

        self.compute()?;
        self.slot.publish(&self.bytes)
    }

    /// Resets smoothing state and clears the published spectrum.
    pub fn reset(&mut self) -> Result<()> {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self.slot.clear()
    }

    fn compute(&mut self) -> Result<()> {
        let size = self.history.len();
        for ((dst, sample), w) in self
            .fft
            .input
            .iter_mut()
            .zip(&self.history)
            .zip(&self.window)
        {
            *dst = sample * w;
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let smoothing = self.config.smoothing.clamp(0.0, 1.0);
        let range = self.config.max_decibels - self.config.min_decibels;
        let norm = 1.0 / size as f32;

        for ((smoothed, byte), bin) in self
            .smoothed
            .iter_mut()
            .zip(self.bytes.iter_mut())
            .zip(&self.fft.spectrum)
        {
            let magnitude = bin.norm() * norm;
            *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;

            let db = 20.0 * smoothed.log10();
            let scaled = 255.0 / range * (db - self.config.min_decibels);
            *byte = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        Ok(())
    }
}

impl fmt::Debug for SpectrumTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumTap")
            .field("config", &self.config)
            .field("bins", &self.bytes.len())
            .finish()
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}
