use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the visualiser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub render: RenderConfig,
    pub beat: BeatConfig,
    pub audio: AudioConfig,
    pub idle: IdleConfig,
    pub poster: PosterConfig,
}

impl VisualizerConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Defaults with a fixed effect seed, so frames are reproducible.
    pub fn deterministic(seed: u64) -> Self {
        let mut config = Self::default();
        config.render.seed = Some(seed);
        config
    }
}

/// How points that the reveal wipe has not reached yet are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevealStyle {
    /// Points past the threshold are not drawn at all.
    #[default]
    Cutoff,
    /// Points near the threshold grow from zero to full radius.
    Grow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub padding_px: f32,
    pub point_radius_px: f32,
    /// Device pixels per logical pixel of the viewport.
    pub pixel_ratio: f32,
    pub reveal_duration_ms: f64,
    pub reveal_style: RevealStyle,
    /// Seed for glitch and jitter randomness. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub glow: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            padding_px: 24.0,
            point_radius_px: 1.25,
            pixel_ratio: 1.0,
            reveal_duration_ms: 2200.0,
            reveal_style: RevealStyle::Cutoff,
            seed: None,
            glow: true,
        }
    }
}

/// Bass-band transient detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Share of the lowest spectrum bins treated as the bass band.
    pub bass_fraction: f32,
    pub history_len: usize,
    pub threshold_ratio: f32,
    /// Minimum bass average (0-255 scale) for a beat to register.
    pub absolute_floor: f32,
    pub peak: f32,
    pub decay: f32,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            bass_fraction: 0.1,
            history_len: 60,
            threshold_ratio: 1.3,
            absolute_floor: 35.0,
            peak: 1.35,
            decay: 0.94,
        }
    }
}

/// Configuration specific to the spectrum tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fft_size: 512,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Synthetic intensity used while no real signal drives the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Fraction of the reveal during which the opening glitch runs.
    pub initial_glitch_window: f32,
    pub initial_glitch_amplitude: f32,
    /// Jitter amplitude once the opening glitch is over and nothing plays.
    pub idle_amplitude: f32,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            initial_glitch_window: 0.15,
            initial_glitch_amplitude: 0.8,
            idle_amplitude: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterConfig {
    pub canvas_width: u32,
    pub padding: u32,
    pub viz_size: u32,
    pub corner_radius: f32,
    pub legend_width: u32,
    pub legend_height: u32,
    pub title_font_px: u32,
    pub artist_font_px: u32,
    pub file_tag: String,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            padding: 40,
            viz_size: 720,
            corner_radius: 32.0,
            legend_width: 200,
            legend_height: 10,
            title_font_px: 56,
            artist_font_px: 22,
            file_tag: "_matrix".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            VisualizerConfig::from_json(r#"{ "render": { "reveal_duration_ms": 2500 } }"#)
                .unwrap();
        assert_eq!(config.render.reveal_duration_ms, 2500.0);
        assert_eq!(config.render.padding_px, 24.0);
        assert_eq!(config.beat, BeatConfig::default());
        assert_eq!(config.poster.file_tag, "_matrix");
    }

    #[test]
    fn reveal_style_uses_snake_case() {
        let config =
            VisualizerConfig::from_json(r#"{ "render": { "reveal_style": "grow" } }"#).unwrap();
        assert_eq!(config.render.reveal_style, RevealStyle::Grow);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = VisualizerConfig::from_json("{ nope").unwrap_err();
        assert!(err.to_string().contains("configuration"));
    }
}
