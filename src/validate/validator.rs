//! Suggestion validation.
//!
//! Raw worker suggestions are checked against the high-priority knowledge
//! pool and the rejection history before anyone sees them. Contradicting
//! a critical entry is grounds for dropping outright; resembling a past
//! rejection costs most of the confidence.

use std::cmp::Ordering;

use crate::context::EffectiveRules;
use crate::knowledge::KnowledgeEntry;
use crate::learning::{normalize_text, AcceptanceStats, RejectionLog};
use crate::worker::RawSuggestion;

use super::similarity::{Similarity, TokenSetSimilarity};

/// Phrases that mark an entry as prohibiting something.
const PROHIBITION_MARKERS: [&str; 4] = ["never", "don't", "avoid", "instead of"];

/// Glue words ignored when looking for shared significant words.
const STOPWORDS: [&str; 30] = [
    "all", "always", "and", "any", "are", "avoid", "but", "can", "code", "don", "dont", "for",
    "has", "have", "instead", "its", "must", "never", "not", "should", "that", "the", "this",
    "use", "used", "using", "when", "will", "with", "your",
];

/// Multiplier applied when a contradiction is found but blocking is off.
const CONTRADICTION_PENALTY: f64 = 0.5;

/// Multiplier applied when a suggestion nearly repeats a past rejection.
const REJECTION_PENALTY: f64 = 0.3;

/// A suggestion that survived validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSuggestion {
    pub suggestion: RawSuggestion,
    /// Final confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Whether the text opposes a high-priority knowledge entry.
    pub contradicts: bool,
    /// Title of the entry it contradicts, when it does.
    pub contradicted_by: Option<String>,
    /// Whether a near-duplicate rejection was found.
    pub near_rejection: bool,
}

/// Checks suggestions against knowledge and history.
pub struct SuggestionValidator {
    similarity: Box<dyn Similarity>,
}

impl Default for SuggestionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionValidator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            similarity: Box::new(TokenSetSimilarity),
        }
    }

    /// Use a different similarity function for the rejection check.
    #[must_use]
    pub fn with_similarity(similarity: Box<dyn Similarity>) -> Self {
        Self { similarity }
    }

    /// Validate a batch, returning survivors ordered by descending
    /// confidence. Ties keep their input order.
    #[must_use]
    pub fn validate(
        &self,
        suggestions: Vec<RawSuggestion>,
        knowledge: &[KnowledgeEntry],
        rejections: &RejectionLog,
        stats: &AcceptanceStats,
        rules: &EffectiveRules,
    ) -> Vec<ValidatedSuggestion> {
        let mut validated = Vec::new();

        for suggestion in suggestions {
            let normalized = normalize_text(&suggestion.text);
            let mut confidence = stats.rate_for(&suggestion.category).unwrap_or(0.5);

            let contradicted_by = find_contradiction(&normalized, knowledge);
            let contradicts = contradicted_by.is_some();
            if contradicts {
                if rules.block_contradictions {
                    tracing::debug!(
                        text = %suggestion.text,
                        entry = contradicted_by.map(|e| e.title.as_str()),
                        "Dropping suggestion that contradicts knowledge"
                    );
                    continue;
                }
                confidence *= CONTRADICTION_PENALTY;
            }

            let mut closest = 0.0f64;
            for record in rejections.same_category(&suggestion.category) {
                closest = closest.max(self.similarity.score(&normalized, &record.text));
            }
            let near_rejection = closest >= rules.rejection_similarity;
            if near_rejection {
                confidence *= REJECTION_PENALTY;
            }

            confidence = confidence.clamp(0.0, 1.0);
            if rules.filter_suggestions && confidence < rules.min_confidence {
                tracing::debug!(
                    text = %suggestion.text,
                    confidence,
                    "Dropping low-confidence suggestion"
                );
                continue;
            }

            validated.push(ValidatedSuggestion {
                contradicted_by: contradicted_by.map(|e| e.title.clone()),
                suggestion,
                confidence,
                contradicts,
                near_rejection,
            });
        }

        validated.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        validated
    }
}

/// First high-priority entry the suggestion text opposes, if any.
fn find_contradiction<'a>(
    normalized: &str,
    knowledge: &'a [KnowledgeEntry],
) -> Option<&'a KnowledgeEntry> {
    let words = significant_words(normalized);
    if words.is_empty() {
        return None;
    }
    knowledge.iter().find(|entry| {
        let content = entry.content.to_lowercase();
        PROHIBITION_MARKERS
            .iter()
            .any(|marker| content.contains(marker))
            && significant_words(&content)
                .iter()
                .any(|word| words.contains(word))
    })
}

/// Words worth comparing: at least three chars, not glue.
fn significant_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Category, Priority};
    use crate::learning::RejectionRecord;

    fn suggestion(text: &str, category: &str) -> RawSuggestion {
        RawSuggestion {
            text: text.to_string(),
            category: category.to_string(),
            file: None,
            line: None,
        }
    }

    fn critical_entry(title: &str, content: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(Category::Gotcha, Priority::Critical, title, content)
    }

    fn defaults() -> EffectiveRules {
        EffectiveRules {
            min_confidence: 0.5,
            block_contradictions: true,
            filter_suggestions: true,
            rejection_similarity: 0.8,
        }
    }

    #[test]
    fn test_contradicting_suggestion_dropped_by_default() {
        let validator = SuggestionValidator::new();
        let knowledge = vec![critical_entry(
            "Password hashing",
            "Always use bcrypt, never MD5",
        )];
        let out = validator.validate(
            vec![suggestion("Use MD5 for password hashing", "security")],
            &knowledge,
            &RejectionLog::default(),
            &AcceptanceStats::default(),
            &defaults(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_contradiction_annotated_when_blocking_off() {
        let validator = SuggestionValidator::new();
        let knowledge = vec![critical_entry(
            "Password hashing",
            "Always use bcrypt, never MD5",
        )];
        let rules = EffectiveRules {
            block_contradictions: false,
            filter_suggestions: false,
            ..defaults()
        };
        let out = validator.validate(
            vec![suggestion("Use MD5 for password hashing", "security")],
            &knowledge,
            &RejectionLog::default(),
            &AcceptanceStats::default(),
            &rules,
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].contradicts);
        assert_eq!(out[0].contradicted_by.as_deref(), Some("Password hashing"));
        assert!((out[0].confidence - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_glue_words_do_not_contradict() {
        let validator = SuggestionValidator::new();
        let knowledge = vec![critical_entry(
            "Indentation",
            "Never use tabs for indentation",
        )];
        let out = validator.validate(
            vec![suggestion("Use serde for JSON parsing", "style")],
            &knowledge,
            &RejectionLog::default(),
            &AcceptanceStats::default(),
            &defaults(),
        );
        assert_eq!(out.len(), 1);
        assert!(!out[0].contradicts);
    }

    #[test]
    fn test_near_rejection_falls_below_min_confidence() {
        let validator = SuggestionValidator::new();
        let mut rejections = RejectionLog::default();
        rejections.push(RejectionRecord::new(
            "style",
            "Rename this variable for clarity",
            None,
        ));
        let out = validator.validate(
            vec![suggestion("Rename this variable for clarity", "style")],
            &[],
            &rejections,
            &AcceptanceStats::default(),
            &defaults(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejections_only_counted_within_category() {
        let validator = SuggestionValidator::new();
        let mut rejections = RejectionLog::default();
        rejections.push(RejectionRecord::new(
            "security",
            "Rename this variable for clarity",
            None,
        ));
        let out = validator.validate(
            vec![suggestion("Rename this variable for clarity", "style")],
            &[],
            &rejections,
            &AcceptanceStats::default(),
            &defaults(),
        );
        assert_eq!(out.len(), 1);
        assert!(!out[0].near_rejection);
    }

    #[test]
    fn test_confidence_starts_from_category_rate() {
        let validator = SuggestionValidator::new();
        let mut stats = AcceptanceStats::default();
        for _ in 0..20 {
            stats.observe("security", true, 0.1);
        }
        let out = validator.validate(
            vec![suggestion("Check the token expiry", "security")],
            &[],
            &RejectionLog::default(),
            &stats,
            &defaults(),
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].confidence > 0.5);
    }

    #[test]
    fn test_exactly_min_confidence_survives() {
        let validator = SuggestionValidator::new();
        let out = validator.validate(
            vec![suggestion("Add a regression test", "testing")],
            &[],
            &RejectionLog::default(),
            &AcceptanceStats::default(),
            &defaults(),
        );
        // No history, no penalties: confidence is exactly the 0.5 floor.
        assert_eq!(out.len(), 1);
        assert!((out[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_output_ordered_by_descending_confidence() {
        let validator = SuggestionValidator::new();
        let mut stats = AcceptanceStats::default();
        for _ in 0..20 {
            stats.observe("security", true, 0.1);
            stats.observe("style", false, 0.1);
        }
        let rules = EffectiveRules {
            filter_suggestions: false,
            ..defaults()
        };
        let out = validator.validate(
            vec![
                suggestion("low first", "style"),
                suggestion("high second", "security"),
            ],
            &[],
            &RejectionLog::default(),
            &stats,
            &rules,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].suggestion.text, "high second");
        assert!(out[0].confidence > out[1].confidence);
    }

    #[test]
    fn test_equal_confidence_keeps_input_order() {
        let validator = SuggestionValidator::new();
        let out = validator.validate(
            vec![
                suggestion("first of two", "testing"),
                suggestion("second of two", "testing"),
            ],
            &[],
            &RejectionLog::default(),
            &AcceptanceStats::default(),
            &defaults(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].suggestion.text, "first of two");
        assert_eq!(out[1].suggestion.text, "second of two");
    }
}
