//! Assembles the bounded review bundle.
//!
//! One pass gathers the task line, target file excerpts, relevance-ranked
//! knowledge and the recent rejection history, in that order. The builder
//! enforces the character budget so later sections lose material first.

use uuid::Uuid;

use crate::config::SentinelConfig;
use crate::knowledge::{Category, KnowledgeEntry, KnowledgeStore, Priority, QueryKeywords};
use crate::learning::RejectionLog;
use crate::storage::{JsonStore, StateDir};

use super::bundle::{clip_chars, BundleBuilder, PromptBundle, TRUNCATION_MARKER};
use super::task::{extend_from_path, TaskSpec, MAX_TASK_KEYWORDS};
use super::vcs::vcs_status;

/// Past rejections surfaced as do-not-resuggest lines.
const REJECTION_CONTEXT_LIMIT: usize = 5;

/// Knowledge content is clipped to this many characters per bundle line.
const ENTRY_CLIP_CHARS: usize = 240;

/// Builds prompt bundles from persisted state and the working tree.
#[derive(Debug)]
pub struct ContextExtractor {
    state: StateDir,
    store: KnowledgeStore,
    config: SentinelConfig,
}

impl ContextExtractor {
    #[must_use]
    pub fn new(state: StateDir, config: SentinelConfig) -> Self {
        let store = KnowledgeStore::new(state.clone(), config.knowledge.clone());
        Self {
            state,
            store,
            config,
        }
    }

    /// Gather everything relevant to `task` into one bounded bundle.
    pub async fn build(&self, task: &TaskSpec) -> PromptBundle {
        let mut keywords = task.keywords();
        if let Some(vcs) = vcs_status(self.state.project_dir()).await {
            tracing::debug!(
                branch = %vcs.branch,
                touched = vcs.touched_paths().len(),
                "Folding VCS status into query keywords"
            );
            for path in vcs.touched_paths() {
                extend_from_path(&mut keywords, path);
            }
            keywords.truncate(MAX_TASK_KEYWORDS);
        }
        let query = QueryKeywords::compile(&keywords);

        let recalled = self
            .store
            .query_default(&query, task.kind.categories())
            .await;
        let mut patterns = Vec::new();
        let mut gotchas = Vec::new();
        let mut corrections = Vec::new();
        for scored in recalled {
            let item = (scored.score, scored.entry.id, render_entry(&scored.entry));
            match scored.entry.category {
                Category::Gotcha => gotchas.push(item),
                Category::Correction => corrections.push(item),
                _ => patterns.push(item),
            }
        }

        let mut builder = BundleBuilder::new(self.config.bundle.max_chars);
        builder.push_line(&format!("# Task: {}", task.label()));
        if let Some(focus) = &task.focus {
            builder.push_line(&format!("**Focus**: {focus}"));
        }
        builder.push_line("");

        self.push_files(&mut builder, task).await;
        push_knowledge(&mut builder, "## Relevant Patterns", patterns);
        push_knowledge(&mut builder, "## Gotchas to Watch For", gotchas);
        push_knowledge(&mut builder, "## Recent Corrections", corrections);
        self.push_rejections(&mut builder).await;

        let bundle = builder.finish();
        tracing::debug!(
            chars = bundle.char_count(),
            entries = bundle.knowledge_ids.len(),
            truncated = bundle.truncated,
            "Context bundle assembled"
        );
        bundle
    }

    /// Excerpts of the task's target files, each capped independently.
    async fn push_files(&self, builder: &mut BundleBuilder, task: &TaskSpec) {
        let mut readable = Vec::new();
        for file in &task.files {
            let path = self.state.project_dir().join(file);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => readable.push((file, content)),
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "Skipping unreadable review target");
                }
            }
        }
        if readable.is_empty() {
            return;
        }

        builder.push_line("## Files to Review");
        for (file, content) in readable {
            builder.push_line(&format!("### {file}"));
            let (clipped, cut) = clip_chars(&content, self.config.bundle.max_file_chars);
            if cut {
                builder.push_block(&format!("{clipped}\n{TRUNCATION_MARKER}"));
                builder.mark_truncated();
            } else {
                builder.push_block(&clipped);
            }
        }
        builder.push_line("");
    }

    async fn push_rejections(&self, builder: &mut BundleBuilder) {
        let log: RejectionLog = JsonStore::new(self.state.rejections_file()).load().await;
        let lines: Vec<String> = log
            .recent(REJECTION_CONTEXT_LIMIT)
            .iter()
            .rev()
            .map(|r| format!("- {}", r.text))
            .collect();
        builder.push_section("## Previously Rejected (do not resuggest)", &lines);
    }
}

/// Add one knowledge section, most relevant first, crediting the entries
/// that actually fit.
fn push_knowledge(builder: &mut BundleBuilder, header: &str, mut items: Vec<(f64, Uuid, String)>) {
    if items.is_empty() {
        return;
    }
    items.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let lines: Vec<String> = items.iter().map(|(_, _, line)| line.clone()).collect();
    let added = builder.push_section(header, &lines);
    for (_, id, _) in items.into_iter().take(added) {
        builder.note_entry(id);
    }
}

fn render_entry(entry: &KnowledgeEntry) -> String {
    match entry.category {
        Category::Gotcha => {
            let (content, _) = clip_chars(&entry.content, ENTRY_CLIP_CHARS);
            if entry.priority == Priority::Critical {
                format!("- [CRITICAL] {}: {}", entry.title, content)
            } else {
                format!("- {}: {}", entry.title, content)
            }
        }
        Category::Correction => {
            let (content, _) = clip_chars(corrected_form(&entry.content), ENTRY_CLIP_CHARS);
            format!("- {}: {}", entry.title, content)
        }
        _ => {
            let (content, _) = clip_chars(&entry.content, ENTRY_CLIP_CHARS);
            format!("- [{}] {}: {}", entry.priority, entry.title, content)
        }
    }
}

/// The "Right: ..." portion of a correction, when the entry records both
/// the mistake and the fix.
fn corrected_form(content: &str) -> &str {
    const MARKER: &[u8] = b"right:";
    let bytes = content.as_bytes();
    if bytes.len() >= MARKER.len() {
        for i in 0..=bytes.len() - MARKER.len() {
            if bytes[i..i + MARKER.len()].eq_ignore_ascii_case(MARKER) {
                return content[i + MARKER.len()..].trim();
            }
        }
    }
    content.trim()
}
