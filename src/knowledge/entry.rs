//! Knowledge entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of knowledge an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pattern,
    Preference,
    Gotcha,
    Solution,
    Correction,
}

impl Category {
    /// All categories in persisted order.
    pub const ALL: [Category; 5] = [
        Category::Pattern,
        Category::Preference,
        Category::Gotcha,
        Category::Solution,
        Category::Correction,
    ];

    /// File stem of the category's persisted collection.
    #[must_use]
    pub fn storage_name(self) -> &'static str {
        match self {
            Category::Pattern => "patterns",
            Category::Preference => "preferences",
            Category::Gotcha => "gotchas",
            Category::Solution => "solutions",
            Category::Correction => "corrections",
        }
    }

    /// Parse a category name as used on the CLI and in worker output.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pattern" | "patterns" => Some(Category::Pattern),
            "preference" | "preferences" => Some(Category::Preference),
            "gotcha" | "gotchas" => Some(Category::Gotcha),
            "solution" | "solutions" => Some(Category::Solution),
            "correction" | "corrections" => Some(Category::Correction),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Pattern => "pattern",
            Category::Preference => "preference",
            Category::Gotcha => "gotcha",
            Category::Solution => "solution",
            Category::Correction => "correction",
        };
        write!(f, "{name}")
    }
}

/// How strongly an entry should influence reviews.
///
/// Ordering is by urgency: `Critical` sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Scalar used by relevance scoring.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Priority::Critical => 1.0,
            Priority::High => 0.75,
            Priority::Medium => 0.5,
            Priority::Low => 0.25,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{name}")
    }
}

/// One persisted unit of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_learned_from")]
    pub learned_from: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_learned_from() -> String {
    "manual".to_string()
}

impl KnowledgeEntry {
    /// Create a new entry with a fresh id and creation timestamp.
    #[must_use]
    pub fn new(
        category: Category,
        priority: Priority,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            priority,
            title: title.into(),
            content: content.into(),
            context: None,
            examples: Vec::new(),
            learned_from: default_learned_from(),
            created: Utc::now(),
            last_used: None,
            use_count: 0,
            tags: Vec::new(),
        }
    }

    /// Attach lowercase tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|t| t.into().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Attach a provenance note.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the origin marker.
    #[must_use]
    pub fn with_learned_from(mut self, learned_from: impl Into<String>) -> Self {
        self.learned_from = learned_from.into();
        self
    }

    /// Record a recall.
    pub fn mark_used(&mut self) {
        self.use_count = self.use_count.saturating_add(1);
        self.last_used = Some(Utc::now());
    }

    /// Timestamp recency scoring decays from.
    #[must_use]
    pub fn freshness(&self) -> DateTime<Utc> {
        self.last_used.unwrap_or(self.created)
    }
}

/// Current schema version for persisted collections.
fn default_version() -> u32 {
    1
}

/// Persisted per-category collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<KnowledgeEntry>,
}

impl Default for KnowledgeFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            entries: Vec::new(),
        }
    }
}
