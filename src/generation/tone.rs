//! Heuristic tone scoring for generated answers
//!
//! A lightweight, fully local signal of how readable and educational an
//! answer is. The score is auxiliary: it never blocks or alters the answer.

const POSITIVE_INDICATORS: &[&str] = &[
    // Encouraging phrasing
    "keep in mind",
    "it's worth noting",
    "important to note",
    "key concept",
    "let's explore",
    "remember that",
    // Clear explanation markers
    "this means",
    "in other words",
    "for example",
    "for instance",
    "such as",
    "the reason is",
    // Structured progression
    "first",
    "second",
    "next",
    "finally",
    "in summary",
    "key takeaway",
];

const NEGATIVE_INDICATORS: &[&str] = &[
    "idk",
    "dunno",
    "sort of",
    "kind of",
    "umm",
    "you know",
    "pretty much",
    "probably",
    "might be",
];

/// Tone analysis result
#[derive(Debug, Clone, PartialEq)]
pub struct ToneAnalysis {
    /// Overall quality score in [0, 1]
    pub score: f32,
    /// Balance of positive vs negative indicator phrases in [0, 1]
    pub indicator_balance: f32,
    /// Readability derived from average sentence length in [0, 1]
    pub readability: f32,
}

/// Analyze the educational tone of an answer
pub fn analyze_tone(text: &str) -> ToneAnalysis {
    let lower = text.to_lowercase();

    let positive = POSITIVE_INDICATORS
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .count();
    let negative = NEGATIVE_INDICATORS
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .count();

    let indicator_balance = if positive + negative > 0 {
        positive as f32 / (positive + negative) as f32
    } else {
        // Neutral when no indicators are present
        0.5
    };

    let readability = readability_score(text);
    let score = indicator_balance * 0.5 + readability * 0.5;

    ToneAnalysis {
        score,
        indicator_balance,
        readability,
    }
}

/// Moderate sentence length reads best; very short or very long sentences
/// score lower
fn readability_score(text: &str) -> f32 {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return 0.5;
    }

    let total_words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    let avg = total_words as f32 / sentences.len() as f32;

    if (8.0..=20.0).contains(&avg) {
        1.0
    } else if (5.0..=25.0).contains(&avg) {
        0.8
    } else {
        0.5
    }
}
