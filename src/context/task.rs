//! Review task descriptions.

use serde::{Deserialize, Serialize};

use crate::knowledge::Category;
use crate::monitor::error_signature;

/// Keywords derived from a task are capped at this many.
pub(crate) const MAX_TASK_KEYWORDS: usize = 24;

/// What kind of analysis the worker is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Review,
    Plan,
    Debug,
}

impl TaskKind {
    /// Knowledge categories emphasized for this kind of task.
    #[must_use]
    pub fn categories(self) -> &'static [Category] {
        match self {
            TaskKind::Review => &[
                Category::Pattern,
                Category::Preference,
                Category::Gotcha,
                Category::Correction,
            ],
            TaskKind::Plan => &[Category::Pattern, Category::Preference, Category::Solution],
            TaskKind::Debug => &[Category::Gotcha, Category::Solution, Category::Correction],
        }
    }

    /// Template file stem for this kind.
    #[must_use]
    pub fn template_name(self) -> &'static str {
        match self {
            TaskKind::Review => "review",
            TaskKind::Plan => "plan",
            TaskKind::Debug => "debug",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template_name())
    }
}

/// One concrete task to gather context for.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    /// Target files, relative to the project root.
    pub files: Vec<String>,
    /// Free-form focus set by the user.
    pub focus: Option<String>,
    /// Error text for debug tasks.
    pub error: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
            focus: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Query keywords derived from file paths, focus and error text.
    #[must_use]
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords = Vec::new();
        for file in &self.files {
            extend_from_path(&mut keywords, file);
        }
        if let Some(focus) = &self.focus {
            extend_from_words(&mut keywords, focus);
        }
        if let Some(error) = &self.error {
            extend_from_words(&mut keywords, &error_signature(error));
        }
        keywords.truncate(MAX_TASK_KEYWORDS);
        keywords
    }

    /// One-line label for bundle headers and logs.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(focus) = &self.focus {
            return focus.clone();
        }
        if !self.files.is_empty() {
            return self.files.join(", ");
        }
        if let Some(error) = &self.error {
            return error_signature(error);
        }
        format!("{} session activity", self.kind)
    }
}

fn push_unique(keywords: &mut Vec<String>, word: &str) {
    let word = word.trim().to_lowercase();
    if word.len() >= 2 && !keywords.contains(&word) {
        keywords.push(word);
    }
}

/// Keywords from one path: stem parts, extension, nearest directories.
pub(crate) fn extend_from_path(keywords: &mut Vec<String>, path: &str) {
    let path = std::path::Path::new(path);
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        for part in stem.split(['_', '-', '.']) {
            push_unique(keywords, part);
        }
    }
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        push_unique(keywords, ext);
    }
    for dir in path
        .parent()
        .map(std::path::Path::components)
        .into_iter()
        .flatten()
        .rev()
        .take(2)
    {
        if let std::path::Component::Normal(name) = dir {
            if let Some(name) = name.to_str() {
                push_unique(keywords, name);
            }
        }
    }
}

fn extend_from_words(keywords: &mut Vec<String>, text: &str) {
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.len() > 2 {
            push_unique(keywords, word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_from_file_path() {
        let task = TaskSpec::new(TaskKind::Review).with_files(["src/auth/session_token.rs"]);
        let keywords = task.keywords();
        assert!(keywords.contains(&"session".to_string()));
        assert!(keywords.contains(&"token".to_string()));
        assert!(keywords.contains(&"rs".to_string()));
        assert!(keywords.contains(&"auth".to_string()));
    }

    #[test]
    fn test_keywords_from_focus_and_error() {
        let task = TaskSpec::new(TaskKind::Debug)
            .with_focus("connection pooling")
            .with_error("TimeoutError: pool exhausted\n  at db.rs");
        let keywords = task.keywords();
        assert!(keywords.contains(&"connection".to_string()));
        assert!(keywords.contains(&"pooling".to_string()));
        assert!(keywords.contains(&"pool".to_string()));
        assert!(keywords.contains(&"exhausted".to_string()));
        // Only the first line of the error contributes.
        assert!(!keywords.contains(&"db".to_string()));
    }

    #[test]
    fn test_keywords_deduplicated_and_capped() {
        let task = TaskSpec::new(TaskKind::Review).with_files(["a/a/a_a.rs", "a/a/a_a.rs"]);
        let keywords = task.keywords();
        let a_count = keywords.iter().filter(|k| *k == "a").count();
        assert!(a_count <= 1);
        assert!(keywords.len() <= MAX_TASK_KEYWORDS);
    }

    #[test]
    fn test_review_categories_include_gotchas() {
        assert!(TaskKind::Review.categories().contains(&Category::Gotcha));
        assert!(!TaskKind::Plan.categories().contains(&Category::Gotcha));
    }

    #[test]
    fn test_label_prefers_focus() {
        let task = TaskSpec::new(TaskKind::Review)
            .with_files(["src/a.rs"])
            .with_focus("error handling");
        assert_eq!(task.label(), "error handling");
        let task = TaskSpec::new(TaskKind::Review).with_files(["src/a.rs"]);
        assert_eq!(task.label(), "src/a.rs");
    }
}
