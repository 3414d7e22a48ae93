//! Self-similarity point field.
//!
//! Every pair of occurrences of the same word becomes a point, including the
//! diagonal and both mirrored off-diagonal pairs. A word seen `k` times
//! contributes `k²` points, so the field renders as a symmetric matrix.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::{TextAnalysis, WordFrequency},
    palette::{FrequencyRamp, Rgb8},
};

/// One plotted `(position, position)` pair of the same word.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfSimilarityPoint {
    pub x: usize,
    pub y: usize,
    pub frequency: f32,
    pub color: Rgb8,
    /// `(x + y) / 2n`, the point's slot in the reveal timeline.
    pub reveal_index: f32,
}

/// Builds the full set of self-similarity points with the default ramp.
///
/// Output order follows the first occurrence of each word; callers must not
/// rely on it beyond grouping.
pub fn build_points(sequence: &[String], word_data: &[WordFrequency]) -> Vec<SelfSimilarityPoint> {
    PointField::build(sequence, word_data, &FrequencyRamp::default()).points
}

/// Point in surface coordinates, ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub x: f32,
    pub y: f32,
    /// Index into [`PointField::colors`].
    pub batch: usize,
    pub reveal_index: f32,
}

/// Immutable point field plus the distinct colors it uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointField {
    points: Vec<SelfSimilarityPoint>,
    batches: Vec<usize>,
    colors: Vec<Rgb8>,
    sequence_len: usize,
}

impl PointField {
    pub fn build(sequence: &[String], word_data: &[WordFrequency], ramp: &FrequencyRamp) -> Self {
        let n = sequence.len();
        if n == 0 {
            return Self::default();
        }

        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut positions: Vec<(&str, Vec<usize>)> = Vec::new();
        for (index, word) in sequence.iter().enumerate() {
            match slots.get(word.as_str()) {
                Some(&slot) => positions[slot].1.push(index),
                None => {
                    slots.insert(word.as_str(), positions.len());
                    positions.push((word.as_str(), vec![index]));
                }
            }
        }

        let frequencies: HashMap<&str, f32> = word_data
            .iter()
            .map(|entry| (entry.word.as_str(), entry.frequency))
            .collect();

        let total: usize = positions.iter().map(|(_, p)| p.len() * p.len()).sum();
        let mut points = Vec::with_capacity(total);
        let mut batches = Vec::with_capacity(total);
        let mut colors: Vec<Rgb8> = Vec::new();
        let denominator = 2.0 * n as f32;

        for (word, indices) in &positions {
            let frequency = frequencies.get(word).copied().unwrap_or(0.0);
            let color = ramp.color_at(frequency);
            let batch = match colors.iter().position(|c| *c == color) {
                Some(batch) => batch,
                None => {
                    colors.push(color);
                    colors.len() - 1
                }
            };

            for &x in indices {
                for &y in indices {
                    points.push(SelfSimilarityPoint {
                        x,
                        y,
                        frequency,
                        color,
                        reveal_index: (x + y) as f32 / denominator,
                    });
                    batches.push(batch);
                }
            }
        }

        tracing::debug!(
            words = positions.len(),
            points = points.len(),
            colors = colors.len(),
            "built point field"
        );

        Self {
            points,
            batches,
            colors,
            sequence_len: n,
        }
    }

    pub fn from_analysis(analysis: &TextAnalysis, ramp: &FrequencyRamp) -> Self {
        Self::build(&analysis.sequence, &analysis.word_data, ramp)
    }

    pub fn points(&self) -> &[SelfSimilarityPoint] {
        &self.points
    }

    /// Distinct point colors; [`ProjectedPoint::batch`] indexes into this.
    pub fn colors(&self) -> &[Rgb8] {
        &self.colors
    }

    pub fn sequence_len(&self) -> usize {
        self.sequence_len
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Projects sequence positions onto a square of side `inner` pixels,
    /// mapping position `i` to `i / n * inner`. Reuses `out`'s allocation.
    pub fn project_into(&self, inner: f32, out: &mut Vec<ProjectedPoint>) {
        out.clear();
        if self.sequence_len == 0 || !inner.is_finite() || inner <= 0.0 {
            return;
        }

        let scale = inner / self.sequence_len as f32;
        out.extend(
            self.points
                .iter()
                .zip(self.batches.iter())
                .map(|(point, &batch)| ProjectedPoint {
                    x: point.x as f32 * scale,
                    y: point.y as f32 * scale,
                    batch,
                    reveal_index: point.reveal_index,
                }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_text;

    fn field_for(text: &str) -> PointField {
        PointField::from_analysis(&analyze_text(text), &FrequencyRamp::default())
    }

    #[test]
    fn unique_words_only_produce_diagonal() {
        let field = field_for("Hey Jude don't make it bad");

        assert_eq!(field.len(), 6);
        assert!(field.points().iter().all(|p| p.x == p.y));
        assert_eq!(field.colors().len(), 1);
    }

    #[test]
    fn repeated_word_fills_full_grid() {
        let field = field_for("la la la");

        assert_eq!(field.len(), 9);
        let mut cells: Vec<(usize, usize)> = field.points().iter().map(|p| (p.x, p.y)).collect();
        cells.sort();
        let expected: Vec<(usize, usize)> =
            (0..3).flat_map(|x| (0..3).map(move |y| (x, y))).collect();
        assert_eq!(cells, expected);

        let first = field.points()[0].color;
        assert!(field.points().iter().all(|p| p.color == first));
    }

    #[test]
    fn point_count_is_sum_of_squared_occurrences() {
        let analysis = analyze_text("a b a c a b d");
        let field = PointField::from_analysis(&analysis, &FrequencyRamp::default());

        let expected: usize = analysis.word_data.iter().map(|w| w.count * w.count).sum();
        assert_eq!(field.len(), expected);
        assert_eq!(field.len(), 9 + 4 + 1 + 1);

        let a_points = field
            .points()
            .iter()
            .filter(|p| analysis.sequence[p.x] == "a")
            .count();
        assert_eq!(a_points, 9);
    }

    #[test]
    fn reveal_index_averages_positions() {
        let field = field_for("x y x y");
        for point in field.points() {
            let expected = (point.x + point.y) as f32 / 8.0;
            assert_eq!(point.reveal_index, expected);
            assert!((0.0..=1.0).contains(&point.reveal_index));
        }
    }

    #[test]
    fn color_follows_frequency() {
        let analysis = analyze_text("hot hot hot hot cold");
        let field = PointField::from_analysis(&analysis, &FrequencyRamp::default());
        let ramp = FrequencyRamp::default();

        for point in field.points() {
            let word = &analysis.sequence[point.x];
            let frequency = analysis.frequency_of(word).unwrap().frequency;
            assert_eq!(point.color, ramp.color_at(frequency));
        }
        assert_eq!(field.colors().len(), 2);
    }

    #[test]
    fn words_missing_from_table_fall_back_to_zero_frequency() {
        let sequence = vec!["ghost".to_string()];
        let points = build_points(&sequence, &[]);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].frequency, 0.0);
        assert_eq!(points[0].color, crate::palette::HEATMAP_COLORS[0]);
    }

    #[test]
    fn empty_sequence_builds_empty_field() {
        let field = field_for("");
        assert!(field.is_empty());

        let mut out = vec![ProjectedPoint {
            x: 1.0,
            y: 1.0,
            batch: 0,
            reveal_index: 0.0,
        }];
        field.project_into(100.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn projection_scales_into_inner_square() {
        let field = field_for("la la la la");
        let mut out = Vec::new();
        field.project_into(200.0, &mut out);

        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|p| p.x >= 0.0 && p.x < 200.0));
        assert!(out.iter().any(|p| p.x == 150.0 && p.y == 50.0));

        field.project_into(0.0, &mut out);
        assert!(out.is_empty());
        field.project_into(f32::NAN, &mut out);
        assert!(out.is_empty());
    }
}
