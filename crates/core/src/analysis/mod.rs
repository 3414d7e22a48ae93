//! Lyrics to word-sequence analysis.
//!
//! Normalisation keeps only `[a-z0-9']` after lowercasing, so scripts outside
//! that range collapse to whitespace. That is the documented behaviour of the
//! analyser, not something callers should expect to be transliterated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one distinct word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub count: usize,
    /// `count` relative to the most repeated word, in `[0, 1]`.
    pub frequency: f32,
}

/// A normalised word at its position in the filtered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordToken<'a> {
    pub text: &'a str,
    pub position: usize,
}

/// Output of [`analyze_text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    /// Normalised words in reading order.
    pub sequence: Vec<String>,
    /// One entry per distinct word, most repeated first. Equal counts keep
    /// first-occurrence order.
    pub word_data: Vec<WordFrequency>,
    /// Whitespace-separated tokens in the raw text, before normalisation.
    pub total_word_count: usize,
}

impl TextAnalysis {
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn distinct_words(&self) -> usize {
        self.word_data.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = WordToken<'_>> + '_ {
        self.sequence
            .iter()
            .enumerate()
            .map(|(position, text)| WordToken {
                text: text.as_str(),
                position,
            })
    }

    /// Looks up the statistics for a normalised word.
    pub fn frequency_of(&self, word: &str) -> Option<&WordFrequency> {
        self.word_data.iter().find(|entry| entry.word == word)
    }
}

/// Turns raw lyrics into a normalised word sequence and frequency table.
///
/// Pure and deterministic; empty or whitespace-only text yields an empty
/// analysis rather than an error.
pub fn analyze_text(text: &str) -> TextAnalysis {
    let total_word_count = text.split_whitespace().count();
    if total_word_count == 0 {
        return TextAnalysis::default();
    }

    let normalized = normalize(text);

    let mut sequence = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for raw in normalized.split_whitespace() {
        let word = raw.trim_matches('\'');
        if word.is_empty() {
            continue;
        }

        sequence.push(word.to_string());
        match slots.get(word) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(word, counts.len());
                counts.push((word, 1));
            }
        }
    }

    let max_count = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);

    let mut word_data: Vec<WordFrequency> = counts
        .into_iter()
        .map(|(word, count)| WordFrequency {
            word: word.to_string(),
            count,
            frequency: if max_count > 0 {
                count as f32 / max_count as f32
            } else {
                0.0
            },
        })
        .collect();

    // Stable sort: ties stay in first-occurrence order.
    word_data.sort_by(|a, b| b.count.cmp(&a.count));

    TextAnalysis {
        sequence,
        word_data,
        total_word_count,
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '\'' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(analysis: &TextAnalysis) -> Vec<&str> {
        analysis.sequence.iter().map(String::as_str).collect()
    }

    #[test]
    fn unique_words_all_share_full_frequency() {
        let analysis = analyze_text("Hey Jude don't make it bad");

        assert_eq!(
            words(&analysis),
            ["hey", "jude", "don't", "make", "it", "bad"]
        );
        assert_eq!(analysis.total_word_count, 6);
        assert_eq!(analysis.word_data.len(), 6);
        for entry in &analysis.word_data {
            assert_eq!(entry.count, 1);
            assert_eq!(entry.frequency, 1.0);
        }
    }

    #[test]
    fn repeated_word_collapses_to_single_entry() {
        let analysis = analyze_text("la la la");

        assert_eq!(words(&analysis), ["la", "la", "la"]);
        assert_eq!(
            analysis.word_data,
            vec![WordFrequency {
                word: "la".to_string(),
                count: 3,
                frequency: 1.0,
            }]
        );
    }

    #[test]
    fn empty_and_blank_input_yield_empty_analysis() {
        assert_eq!(analyze_text(""), TextAnalysis::default());
        assert_eq!(analyze_text("  \n\t  "), TextAnalysis::default());
    }

    #[test]
    fn punctuation_becomes_separators_and_edge_apostrophes_are_trimmed() {
        let analysis = analyze_text("'Cause I'm  FREE... free-fallin' ''' !!!");

        assert_eq!(words(&analysis), ["cause", "i'm", "free", "free", "fallin"]);
        // Raw count includes the apostrophe-only and punctuation-only tokens.
        assert_eq!(analysis.total_word_count, 6);
    }

    #[test]
    fn punctuation_only_text_has_raw_count_but_no_sequence() {
        let analysis = analyze_text("?! ... ---");
        assert!(analysis.is_empty());
        assert!(analysis.word_data.is_empty());
        assert_eq!(analysis.total_word_count, 3);
    }

    #[test]
    fn non_latin_scripts_degrade_to_whitespace() {
        let analysis = analyze_text("любовь love 愛");
        assert_eq!(words(&analysis), ["love"]);
    }

    #[test]
    fn counts_sum_to_sequence_length_and_sort_descending() {
        let text = "yeah yeah yeah oh oh baby yeah we go oh oh";
        let analysis = analyze_text(text);

        let total: usize = analysis.word_data.iter().map(|w| w.count).sum();
        assert_eq!(total, analysis.sequence.len());

        for pair in analysis.word_data.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }

        let top = &analysis.word_data[0];
        assert_eq!(top.frequency, 1.0);
        assert!(analysis
            .word_data
            .iter()
            .all(|w| (0.0..=1.0).contains(&w.frequency)));
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let analysis = analyze_text("b a c a b c d");
        let order: Vec<&str> = analysis.word_data.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(order, ["b", "a", "c", "d"]);
    }

    #[test]
    fn analysis_is_idempotent() {
        let text = "Oh, oh, oh! It's magic, you know\nNever believe it's not so";
        assert_eq!(analyze_text(text), analyze_text(text));
    }

    #[test]
    fn tokens_carry_positions() {
        let analysis = analyze_text("one two one");
        let tokens: Vec<_> = analysis.tokens().collect();
        assert_eq!(tokens[2], WordToken { text: "one", position: 2 });
        assert_eq!(analysis.frequency_of("two").map(|w| w.count), Some(1));
        assert_eq!(analysis.frequency_of("one").map(|w| w.frequency), Some(1.0));
    }
}
