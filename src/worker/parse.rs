//! Worker response parsing.
//!
//! The worker is told to answer with a JSON array and nothing else, but
//! responses still arrive wrapped in prose often enough that the array is
//! located by scanning. Malformed items are dropped one at a time; only
//! the array itself failing to parse empties the whole response.

use serde::{Deserialize, Serialize};

/// One suggestion as emitted by the analysis worker, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSuggestion {
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

/// Parse the worker's response text into suggestions.
///
/// Never fails: a response with no usable array yields an empty list.
#[must_use]
pub fn parse_suggestions(text: &str) -> Vec<RawSuggestion> {
    let Some(slice) = extract_array(text) else {
        tracing::warn!("No JSON array found in worker response");
        return Vec::new();
    };

    let items: Vec<serde_json::Value> = match serde_json::from_str(slice) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, "Worker response array failed to parse");
            return Vec::new();
        }
    };

    let mut suggestions = Vec::new();
    for item in items {
        match serde_json::from_value::<RawSuggestion>(item) {
            Ok(mut suggestion) => {
                suggestion.text = suggestion.text.trim().to_string();
                suggestion.category = suggestion.category.trim().to_lowercase();
                if suggestion.text.is_empty() || suggestion.category.is_empty() {
                    tracing::debug!("Dropping suggestion with empty text or category");
                    continue;
                }
                suggestions.push(suggestion);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed suggestion item");
            }
        }
    }
    suggestions
}

/// Locate the first complete JSON array in `text`.
///
/// Bracket depth is tracked outside string literals so suggestion text
/// containing `]` does not end the scan early.
fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_array() {
        let text = r#"[{"text": "Use prepared statements", "category": "security"}]"#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].category, "security");
        assert_eq!(suggestions[0].file, None);
    }

    #[test]
    fn test_parse_array_with_surrounding_prose() {
        let text = r#"Here are my findings:
[{"text": "Add a timeout", "category": "Correctness", "file": "src/net.rs", "line": 42}]
Let me know if you need more."#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].category, "correctness");
        assert_eq!(suggestions[0].file.as_deref(), Some("src/net.rs"));
        assert_eq!(suggestions[0].line, Some(42));
    }

    #[test]
    fn test_bracket_inside_string_does_not_end_scan() {
        let text = r#"[{"text": "Index with vec[0] is risky]", "category": "style"},
                       {"text": "Second one", "category": "style"}]"#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 2);
    }

    #[test]
    fn test_malformed_item_dropped_individually() {
        let text = r#"[
            {"text": "Keep me", "category": "security"},
            {"category": "missing text"},
            {"text": "", "category": "style"},
            {"text": "Also keep me", "category": "testing"}
        ]"#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].text, "Keep me");
        assert_eq!(suggestions[1].text, "Also keep me");
    }

    #[test]
    fn test_non_object_items_dropped() {
        let text = r#"["just a string", 42, {"text": "Real one", "category": "style"}]"#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn test_fully_malformed_yields_empty() {
        assert!(parse_suggestions("no json at all").is_empty());
        assert!(parse_suggestions("[{broken json").is_empty());
        assert!(parse_suggestions("").is_empty());
    }

    #[test]
    fn test_empty_array_yields_empty() {
        assert!(parse_suggestions("[]").is_empty());
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let text = r#"[{"text": "Say \"no\" to unwrap [here]", "category": "style"}]"#;
        let suggestions = parse_suggestions(text);
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].text.contains("unwrap"));
    }
}
