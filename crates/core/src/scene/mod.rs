//! Per-frame scene values derived from reveal progress and intensity,
//! and the gates that decide which layers are drawn.

use crate::config::IdleConfig;

/// Intensity above which the whole composition shakes and points glitch.
pub const GLITCH_THRESHOLD: f32 = 1.1;
/// Reveal threshold runs ahead of load progress so the wipe finishes early.
pub const REVEAL_LEAD: f32 = 1.6;

const HALO_MIN_INTENSITY: f32 = 0.05;
const CHROMATIC_MIN_INTENSITY: f32 = 0.4;
const BLOOM_MIN_INTENSITY: f32 = 0.1;

/// Slowly orbiting focal point for halo and bloom placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalPoint {
    pub x: f32,
    pub y: f32,
}

impl FocalPoint {
    /// Independent sinusoids on each axis plus a small intensity-driven wobble.
    pub fn orbit(inner: f32, time_ms: f64, intensity: f32) -> Self {
        let t = (time_ms * 0.001) as f32;
        let centre = inner / 2.0;
        let reach = inner / 3.2;
        let wobble = 15.0 * intensity;
        Self {
            x: centre + (t * 0.95).cos() * reach + (t * 4.2).sin() * wobble,
            y: centre + (t * 0.75).sin() * reach + (t * 3.2).cos() * wobble,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Synthetic intensity substituted while no real signal drives the scene.
///
/// `sample` is a uniform draw in `[0, 1)`.
pub fn synthetic_intensity(idle: &IdleConfig, load_progress: f32, audio_active: bool, sample: f32) -> f32 {
    if load_progress < idle.initial_glitch_window {
        sample * idle.initial_glitch_amplitude
    } else if !audio_active {
        sample * idle.idle_amplitude
    } else {
        0.0
    }
}

/// Values computed once per frame and shared by every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub time_ms: f64,
    pub elapsed_ms: f64,
    pub load_progress: f32,
    /// Beat envelope from real audio; zero when nothing plays.
    pub beat_intensity: f32,
    /// `max(beat_intensity, synthetic jitter)`.
    pub intensity: f32,
    pub playing: bool,
    pub initial_glitch: bool,
    /// Side of the square the points are projected into, in logical pixels.
    pub inner: f32,
    pub focal: FocalPoint,
}

impl FrameState {
    pub fn reveal_threshold(&self) -> f32 {
        self.load_progress * REVEAL_LEAD
    }

    pub fn glitching(&self) -> bool {
        self.intensity > GLITCH_THRESHOLD
    }

    pub fn halo_visible(&self) -> bool {
        (self.playing || self.initial_glitch) && self.intensity > HALO_MIN_INTENSITY
    }

    pub fn halo_alpha(&self) -> f32 {
        let base = if self.playing { 0.22 } else { 0.45 };
        base * self.intensity
    }

    pub fn halo_radius(&self) -> f32 {
        self.inner * (0.45 + self.intensity * 0.7)
    }

    pub fn chromatic_visible(&self) -> bool {
        (self.playing || self.load_progress < 0.5) && self.intensity > CHROMATIC_MIN_INTENSITY
    }

    pub fn chromatic_offset(&self) -> f32 {
        self.intensity * 8.0
    }

    pub fn wipe_visible(&self) -> bool {
        self.load_progress < 1.0
    }

    pub fn bloom_visible(&self) -> bool {
        self.playing && self.beat_intensity > BLOOM_MIN_INTENSITY
    }

    pub fn bloom_radius(&self) -> f32 {
        self.inner * (0.6 + self.beat_intensity * 0.55)
    }

    pub fn bloom_alpha(&self) -> f32 {
        0.25 + self.beat_intensity * 0.35
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(load_progress: f32, beat: f32, intensity: f32, playing: bool) -> FrameState {
        FrameState {
            time_ms: 0.0,
            elapsed_ms: 0.0,
            load_progress,
            beat_intensity: beat,
            intensity,
            playing,
            initial_glitch: load_progress < 0.15,
            inner: 400.0,
            focal: FocalPoint::orbit(400.0, 0.0, intensity),
        }
    }

    #[test]
    fn orbit_starts_right_of_centre_and_stays_near_canvas() {
        let focal = FocalPoint::orbit(320.0, 0.0, 0.0);
        assert!((focal.x - (160.0 + 100.0)).abs() < 1e-3);
        assert!((focal.y - 160.0).abs() < 1e-3);

        for frame in 0..600 {
            let p = FocalPoint::orbit(320.0, frame as f64 * 16.7, 1.35);
            assert!(p.is_finite());
            assert!(p.x > -30.0 && p.x < 350.0);
            assert!(p.y > -30.0 && p.y < 350.0);
        }
    }

    #[test]
    fn degenerate_geometry_produces_non_finite_focal() {
        let focal = FocalPoint::orbit(f32::NAN, 0.0, 0.0);
        assert!(!focal.is_finite());
    }

    #[test]
    fn synthetic_jitter_depends_on_phase_and_audio() {
        let idle = IdleConfig::default();
        assert_eq!(synthetic_intensity(&idle, 0.1, true, 0.5), 0.4);
        assert_eq!(synthetic_intensity(&idle, 0.5, false, 1.0), idle.idle_amplitude);
        assert_eq!(synthetic_intensity(&idle, 0.5, true, 1.0), 0.0);
    }

    #[test]
    fn layer_gates_follow_intensity() {
        let idle_steady = state(1.0, 0.0, 0.1, false);
        assert!(!idle_steady.halo_visible());
        assert!(!idle_steady.chromatic_visible());
        assert!(!idle_steady.wipe_visible());
        assert!(!idle_steady.bloom_visible());

        let opening = state(0.05, 0.0, 0.6, false);
        assert!(opening.halo_visible());
        assert!(opening.chromatic_visible());
        assert!(opening.wipe_visible());
        assert!(!opening.glitching());

        let beat = state(1.0, 1.35, 1.35, true);
        assert!(beat.halo_visible());
        assert!(beat.chromatic_visible());
        assert!(beat.bloom_visible());
        assert!(beat.glitching());
        assert!((beat.reveal_threshold() - 1.6).abs() < 1e-6);
        assert!((beat.bloom_alpha() - (0.25 + 1.35 * 0.35)).abs() < 1e-6);
    }
}
