//! Text similarity for rejection-history checks.

use std::collections::HashSet;

/// Scores how alike two normalized texts are, in `0.0..=1.0`.
///
/// The exact algorithm is an implementation detail; anything monotone in
/// "these say the same thing" works here.
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Token-set overlap (Jaccard index) over whitespace-split words.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetSimilarity;

impl Similarity for TokenSetSimilarity {
    fn score(&self, a: &str, b: &str) -> f64 {
        jaccard(a, b)
    }
}

/// Jaccard index of the two texts' word sets.
#[must_use]
pub fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_score_one() {
        assert!((jaccard("use bcrypt for hashing", "use bcrypt for hashing") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert!(jaccard("alpha beta", "gamma delta") < 1e-9);
    }

    #[test]
    fn test_word_order_does_not_matter() {
        assert!((jaccard("a b c", "c b a") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap() {
        // {a, b, c} vs {b, c, d}: 2 shared of 4 total.
        assert!((jaccard("a b c", "b c d") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_against_empty_is_identical() {
        assert!((jaccard("", "") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_against_text_is_zero() {
        assert!(jaccard("", "something") < 1e-9);
    }

    #[test]
    fn test_near_duplicate_clears_default_threshold() {
        let a = "use connection pooling for all database access in this module";
        let b = "use connection pooling for all database access in that module";
        assert!(jaccard(a, b) >= 0.8);
    }
}
