//! Relevance scoring for knowledge recall.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::RelevanceWeights;

use super::KnowledgeEntry;

/// Minimum keyword length worth matching.
const MIN_KEYWORD_LEN: usize = 2;

/// One query keyword with its word-boundary matcher.
#[derive(Debug)]
struct KeywordPattern {
    raw: String,
    word: Regex,
}

/// Compiled, deduplicated query keywords.
///
/// Matching is whole-token: the keyword `py` matches the tag `py` or the
/// text `a py script`, never `happy`.
#[derive(Debug, Default)]
pub struct QueryKeywords {
    patterns: Vec<KeywordPattern>,
}

impl QueryKeywords {
    /// Compile keywords, dropping blanks, duplicates and anything too
    /// short to be meaningful.
    #[must_use]
    pub fn compile<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<KeywordPattern> = Vec::new();
        for keyword in keywords {
            let raw = keyword.as_ref().trim().to_lowercase();
            if raw.len() < MIN_KEYWORD_LEN || patterns.iter().any(|p| p.raw == raw) {
                continue;
            }
            match Regex::new(&format!(r"\b{}\b", regex::escape(&raw))) {
                Ok(word) => patterns.push(KeywordPattern { raw, word }),
                Err(e) => {
                    tracing::debug!(keyword = %raw, error = %e, "Skipping unmatchable keyword");
                }
            }
        }
        Self { patterns }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Fraction of keywords matching any tag as a whole token.
    #[must_use]
    pub fn tag_fraction(&self, tags: &[String]) -> f64 {
        if self.patterns.is_empty() {
            return 0.0;
        }
        let matched = self
            .patterns
            .iter()
            .filter(|p| tags.iter().any(|tag| p.raw == *tag || p.word.is_match(tag)))
            .count();
        matched as f64 / self.patterns.len() as f64
    }

    /// Fraction of keywords found in `text` on word boundaries.
    ///
    /// `text` must already be lowercase.
    #[must_use]
    pub fn text_fraction(&self, text: &str) -> f64 {
        if self.patterns.is_empty() {
            return 0.0;
        }
        let matched = self
            .patterns
            .iter()
            .filter(|p| p.word.is_match(text))
            .count();
        matched as f64 / self.patterns.len() as f64
    }
}

/// Recency factor halving every `half_life_hours`.
///
/// A non-positive half-life disables decay entirely instead of erroring,
/// so freshly-imported stores can opt out of age penalties.
#[must_use]
pub fn recency_decay(age_hours: f64, half_life_hours: f64) -> f64 {
    if half_life_hours <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(age_hours.max(0.0) / half_life_hours)
}

/// Composite relevance of one entry for a compiled query.
#[must_use]
pub fn score_entry(
    entry: &KnowledgeEntry,
    query: &QueryKeywords,
    weights: &RelevanceWeights,
    half_life_hours: f64,
    now: DateTime<Utc>,
) -> f64 {
    let tag_match = query.tag_fraction(&entry.tags);
    let text = format!("{} {}", entry.title, entry.content).to_lowercase();
    let keyword_match = query.text_fraction(&text);
    let age_hours = (now - entry.freshness()).num_seconds() as f64 / 3600.0;
    let recency = recency_decay(age_hours, half_life_hours);

    weights.priority * entry.priority.weight()
        + weights.tags * tag_match
        + weights.keywords * keyword_match
        + weights.recency * recency
}
