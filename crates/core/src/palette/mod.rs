//! Point colors: the five-stop frequency ramp and its legend gradient.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    /// Converts to a tiny-skia color with the given alpha. Alpha is clamped
    /// into `[0, 1]`; a non-finite alpha yields `None`.
    pub fn with_alpha(self, alpha: f32) -> Option<tiny_skia::Color> {
        if !alpha.is_finite() {
            return None;
        }
        tiny_skia::Color::from_rgba(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha.clamp(0.0, 1.0),
        )
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Neon palette from rare to hot: violet, sky, emerald, electric yellow,
/// vivid rose.
pub const HEATMAP_COLORS: [Rgb8; 5] = [
    Rgb8::from_hex(0x8B5CF6),
    Rgb8::from_hex(0x0EA5E9),
    Rgb8::from_hex(0x10B981),
    Rgb8::from_hex(0xFACC15),
    Rgb8::from_hex(0xF43F5E),
];

const RAMP_DOMAIN: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Piecewise-linear mapping from normalised word frequency to color.
///
/// The stops are fixed; the ramp does not adapt to the distribution of any
/// particular song.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyRamp {
    stops: [Rgb8; 5],
}

impl Default for FrequencyRamp {
    fn default() -> Self {
        Self {
            stops: HEATMAP_COLORS,
        }
    }
}

impl FrequencyRamp {
    pub fn new(stops: [Rgb8; 5]) -> Self {
        Self { stops }
    }

    pub fn stops(&self) -> &[Rgb8; 5] {
        &self.stops
    }

    /// Interpolates in RGB space. Inputs outside `[0, 1]` are clamped and NaN
    /// maps to the rare end of the ramp.
    pub fn color_at(&self, frequency: f32) -> Rgb8 {
        let value = if frequency.is_nan() {
            0.0
        } else {
            frequency.clamp(0.0, 1.0)
        };

        let segment = RAMP_DOMAIN
            .windows(2)
            .position(|w| value <= w[1])
            .unwrap_or(RAMP_DOMAIN.len() - 2);
        let (lo, hi) = (RAMP_DOMAIN[segment], RAMP_DOMAIN[segment + 1]);
        let t = (value - lo) / (hi - lo);
        self.stops[segment].lerp(self.stops[segment + 1], t)
    }

    /// Gradient stops for drawing the ramp itself, e.g. as a legend bar.
    pub fn gradient_stops(&self) -> Vec<tiny_skia::GradientStop> {
        RAMP_DOMAIN
            .iter()
            .zip(self.stops.iter())
            .filter_map(|(&pos, color)| {
                color
                    .with_alpha(1.0)
                    .map(|c| tiny_skia::GradientStop::new(pos, c))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_stops_match_palette() {
        let ramp = FrequencyRamp::default();
        assert_eq!(ramp.color_at(0.0), HEATMAP_COLORS[0]);
        assert_eq!(ramp.color_at(0.25), HEATMAP_COLORS[1]);
        assert_eq!(ramp.color_at(0.5), HEATMAP_COLORS[2]);
        assert_eq!(ramp.color_at(0.75), HEATMAP_COLORS[3]);
        assert_eq!(ramp.color_at(1.0), HEATMAP_COLORS[4]);
    }

    #[test]
    fn interpolates_between_stops() {
        let ramp = FrequencyRamp::new([
            Rgb8::new(0, 0, 0),
            Rgb8::new(100, 100, 100),
            Rgb8::new(200, 200, 200),
            Rgb8::new(200, 0, 0),
            Rgb8::new(0, 0, 0),
        ]);
        assert_eq!(ramp.color_at(0.125), Rgb8::new(50, 50, 50));
        assert_eq!(ramp.color_at(0.625), Rgb8::new(200, 100, 100));
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let ramp = FrequencyRamp::default();
        assert_eq!(ramp.color_at(-3.0), HEATMAP_COLORS[0]);
        assert_eq!(ramp.color_at(7.0), HEATMAP_COLORS[4]);
        assert_eq!(ramp.color_at(f32::NAN), HEATMAP_COLORS[0]);
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(HEATMAP_COLORS[0].to_string(), "#8B5CF6");
        assert!(HEATMAP_COLORS[0].with_alpha(f32::NAN).is_none());
        assert!(HEATMAP_COLORS[0].with_alpha(4.0).is_some());
    }
}
