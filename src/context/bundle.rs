//! Bounded prompt bundle assembly.

use uuid::Uuid;

/// Marker appended wherever content was cut.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Cut `text` to at most `max_chars` characters on a char boundary.
/// Returns the kept portion and whether anything was dropped.
#[must_use]
pub fn clip_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    (text.chars().take(max_chars).collect(), true)
}

/// The rendered context handed to the analysis worker.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptBundle {
    pub text: String,
    /// Knowledge entries that made it into the bundle.
    pub knowledge_ids: Vec<Uuid>,
    /// Whether anything was dropped or cut to fit.
    pub truncated: bool,
}

impl PromptBundle {
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Incremental builder enforcing the bundle character cap.
///
/// Sections are appended in fixed order; inside a section, callers push
/// lines in descending relevance so whatever gets cut is the least
/// relevant material.
#[derive(Debug)]
pub struct BundleBuilder {
    max_chars: usize,
    used: usize,
    text: String,
    knowledge_ids: Vec<Uuid>,
    truncated: bool,
}

impl BundleBuilder {
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            used: 0,
            text: String::new(),
            knowledge_ids: Vec::new(),
            truncated: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.max_chars.saturating_sub(self.used)
    }

    /// Append one line if it fits. Returns whether it was added.
    pub fn push_line(&mut self, line: &str) -> bool {
        let cost = line.chars().count() + 1;
        if cost > self.remaining() {
            self.truncated = true;
            return false;
        }
        self.text.push_str(line);
        self.text.push('\n');
        self.used += cost;
        true
    }

    /// Append a header plus as many lines as fit, returning how many
    /// content lines were added. The section is skipped entirely when not
    /// even its first line fits.
    pub fn push_section(&mut self, header: &str, lines: &[String]) -> usize {
        if lines.is_empty() {
            return 0;
        }
        let lead_cost = header.chars().count() + 2 + lines[0].chars().count() + 1;
        if lead_cost > self.remaining() {
            self.truncated = true;
            return 0;
        }
        self.push_line(header);
        let mut added = 0;
        for line in lines {
            if !self.push_line(line) {
                break;
            }
            added += 1;
        }
        self.push_line("");
        added
    }

    /// Append a multi-line block, cutting it to the remaining budget with
    /// a truncation marker. UTF-8 safe.
    pub fn push_block(&mut self, block: &str) {
        let budget = self.remaining().saturating_sub(1);
        if budget == 0 {
            self.truncated = true;
            return;
        }
        let total = block.chars().count();
        if total <= budget {
            self.text.push_str(block);
            self.text.push('\n');
            self.used += total + 1;
            return;
        }

        let marker_len = TRUNCATION_MARKER.chars().count() + 1;
        if budget <= marker_len {
            self.truncated = true;
            return;
        }
        let keep = budget - marker_len;
        let cut: String = block.chars().take(keep).collect();
        self.text.push_str(&cut);
        self.text.push('\n');
        self.text.push_str(TRUNCATION_MARKER);
        self.text.push('\n');
        self.used += keep + marker_len + 1;
        self.truncated = true;
    }

    /// Remember a knowledge entry as included.
    pub fn note_entry(&mut self, id: Uuid) {
        self.knowledge_ids.push(id);
    }

    /// Flag the bundle as incomplete without adding anything.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    #[must_use]
    pub fn finish(self) -> PromptBundle {
        PromptBundle {
            text: self.text,
            knowledge_ids: self.knowledge_ids,
            truncated: self.truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_within_budget_all_fit() {
        let mut builder = BundleBuilder::new(100);
        assert!(builder.push_line("first"));
        assert!(builder.push_line("second"));
        let bundle = builder.finish();
        assert_eq!(bundle.text, "first\nsecond\n");
        assert!(!bundle.truncated);
    }

    #[test]
    fn test_line_over_budget_dropped() {
        let mut builder = BundleBuilder::new(10);
        assert!(builder.push_line("12345678"));
        assert!(!builder.push_line("overflow line"));
        let bundle = builder.finish();
        assert!(bundle.truncated);
        assert!(!bundle.text.contains("overflow"));
    }

    #[test]
    fn test_bundle_never_exceeds_cap() {
        let mut builder = BundleBuilder::new(50);
        for i in 0..30 {
            builder.push_line(&format!("line number {i}"));
        }
        let bundle = builder.finish();
        assert!(bundle.char_count() <= 50);
    }

    #[test]
    fn test_section_drops_lowest_relevance_first() {
        let mut builder = BundleBuilder::new(40);
        let lines = vec![
            "top relevance".to_string(),
            "mid relevance".to_string(),
            "low relevance that will not fit at all".to_string(),
        ];
        builder.push_section("## Patterns", &lines);
        let bundle = builder.finish();
        assert!(bundle.text.contains("top relevance"));
        assert!(!bundle.text.contains("low relevance"));
        assert!(bundle.truncated);
    }

    #[test]
    fn test_section_skipped_when_header_does_not_fit() {
        let mut builder = BundleBuilder::new(10);
        builder.push_section("## A very long header", &["line".to_string()]);
        let bundle = builder.finish();
        assert!(bundle.text.is_empty());
        assert!(bundle.truncated);
    }

    #[test]
    fn test_empty_section_adds_nothing() {
        let mut builder = BundleBuilder::new(100);
        builder.push_section("## Empty", &[]);
        let bundle = builder.finish();
        assert!(bundle.text.is_empty());
        assert!(!bundle.truncated);
    }

    #[test]
    fn test_block_cut_with_marker() {
        let mut builder = BundleBuilder::new(60);
        let block = "x".repeat(200);
        builder.push_block(&block);
        let bundle = builder.finish();
        assert!(bundle.truncated);
        assert!(bundle.text.contains(TRUNCATION_MARKER));
        assert!(bundle.char_count() <= 60);
    }

    #[test]
    fn test_block_truncation_is_utf8_safe() {
        let mut builder = BundleBuilder::new(40);
        let block = "héllo wörld ".repeat(20);
        builder.push_block(&block);
        let bundle = builder.finish();
        assert!(bundle.char_count() <= 40);
    }

    #[test]
    fn test_clip_chars_respects_boundaries() {
        let (kept, cut) = clip_chars("héllo", 3);
        assert_eq!(kept, "hél");
        assert!(cut);
        let (kept, cut) = clip_chars("short", 10);
        assert_eq!(kept, "short");
        assert!(!cut);
    }

    #[test]
    fn test_small_block_fits_untouched() {
        let mut builder = BundleBuilder::new(100);
        builder.push_block("short block");
        let bundle = builder.finish();
        assert!(bundle.text.contains("short block"));
        assert!(!bundle.truncated);
    }
}
