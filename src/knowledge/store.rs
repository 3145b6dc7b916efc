//! Persisted knowledge store with relevance-ranked recall.

use std::cmp::Ordering;

use chrono::Utc;
use uuid::Uuid;

use crate::config::KnowledgeConfig;
use crate::storage::{FileLock, JsonStore, StateDir, StorageError};

use super::{score_entry, Category, KnowledgeEntry, KnowledgeFile, Priority, QueryKeywords};

/// Entries scoring below this never make it into a bundle.
const MIN_RELEVANCE: f64 = 0.2;

/// An entry paired with its relevance for the current query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: KnowledgeEntry,
    pub score: f64,
}

/// Per-category counts for display.
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub total: usize,
    pub by_category: Vec<(Category, usize)>,
    pub most_used: Vec<(String, u64)>,
}

/// Categorized knowledge persisted as one JSON collection per category.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    state: StateDir,
    config: KnowledgeConfig,
}

impl KnowledgeStore {
    #[must_use]
    pub fn new(state: StateDir, config: KnowledgeConfig) -> Self {
        Self { state, config }
    }

    fn record(&self, category: Category) -> JsonStore<KnowledgeFile> {
        JsonStore::new(self.state.knowledge_file(category.storage_name()))
    }

    /// Insert an entry, or update the existing one with the same title.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the collection cannot be locked or
    /// written; the previous contents stay intact in that case.
    pub async fn add(&self, entry: KnowledgeEntry) -> Result<Uuid, StorageError> {
        let record = self.record(entry.category);
        let _lock = FileLock::acquire(record.lock_path()).await?;
        let mut file = record.load().await;

        let id = if let Some(existing) = file
            .entries
            .iter_mut()
            .find(|e| e.title.eq_ignore_ascii_case(&entry.title))
        {
            existing.priority = entry.priority;
            existing.content = entry.content;
            if entry.context.is_some() {
                existing.context = entry.context;
            }
            if !entry.examples.is_empty() {
                existing.examples = entry.examples;
            }
            if !entry.tags.is_empty() {
                existing.tags = entry.tags;
            }
            tracing::debug!(
                category = %existing.category,
                title = %existing.title,
                "Updated existing knowledge entry"
            );
            existing.id
        } else {
            let id = entry.id;
            tracing::debug!(category = %entry.category, title = %entry.title, "Added knowledge entry");
            file.entries.push(entry);
            id
        };

        record.save(&file).await?;
        Ok(id)
    }

    /// All entries of one category, unranked.
    pub async fn entries(&self, category: Category) -> Vec<KnowledgeEntry> {
        self.record(category).load().await.entries
    }

    /// Relevance-ranked recall of up to `per_category` entries from each
    /// requested category. Recalled entries get their use count bumped;
    /// if the collection is locked by another process the recall still
    /// returns results and only the accounting is skipped.
    pub async fn query(
        &self,
        keywords: &QueryKeywords,
        categories: &[Category],
        per_category: usize,
    ) -> Vec<ScoredEntry> {
        let now = Utc::now();
        let mut results = Vec::new();

        for &category in categories {
            let record = self.record(category);
            match FileLock::acquire(record.lock_path()).await {
                Ok(_lock) => {
                    let mut file = record.load().await;
                    let ranked = self.rank(&file.entries, keywords, per_category, now);
                    if ranked.is_empty() {
                        continue;
                    }
                    for &(_, idx) in &ranked {
                        file.entries[idx].mark_used();
                    }
                    if let Err(e) = record.save(&file).await {
                        tracing::warn!(
                            category = %category,
                            error = %e,
                            "Failed to persist recall counts"
                        );
                    }
                    results.extend(ranked.into_iter().map(|(score, idx)| ScoredEntry {
                        entry: file.entries[idx].clone(),
                        score,
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        category = %category,
                        error = %e,
                        "Knowledge collection locked, serving recall read-only"
                    );
                    let file = record.load().await;
                    let ranked = self.rank(&file.entries, keywords, per_category, now);
                    results.extend(ranked.into_iter().map(|(score, idx)| ScoredEntry {
                        entry: file.entries[idx].clone(),
                        score,
                    }));
                }
            }
        }

        results
    }

    /// Recall using the configured per-category limit.
    pub async fn query_default(
        &self,
        keywords: &QueryKeywords,
        categories: &[Category],
    ) -> Vec<ScoredEntry> {
        self.query(keywords, categories, self.config.max_per_category)
            .await
    }

    /// Every critical and high priority entry across all categories.
    pub async fn high_priority_entries(&self) -> Vec<KnowledgeEntry> {
        let mut entries = Vec::new();
        for category in Category::ALL {
            entries.extend(
                self.record(category)
                    .load()
                    .await
                    .entries
                    .into_iter()
                    .filter(|e| e.priority <= Priority::High),
            );
        }
        entries
    }

    /// Category counts and the most-recalled titles.
    pub async fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary::default();
        let mut all: Vec<(String, u64)> = Vec::new();
        for category in Category::ALL {
            let entries = self.entries(category).await;
            summary.total += entries.len();
            summary.by_category.push((category, entries.len()));
            all.extend(entries.into_iter().map(|e| (e.title, e.use_count)));
        }
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(5);
        summary.most_used = all;
        summary
    }

    /// Score, filter and order one collection, returning `(score, index)`
    /// pairs for the winners.
    fn rank(
        &self,
        entries: &[KnowledgeEntry],
        keywords: &QueryKeywords,
        per_category: usize,
        now: chrono::DateTime<Utc>,
    ) -> Vec<(f64, usize)> {
        let mut scored: Vec<(f64, usize)> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                (
                    score_entry(
                        entry,
                        keywords,
                        &self.config.relevance,
                        self.config.half_life_hours,
                        now,
                    ),
                    idx,
                )
            })
            .filter(|&(score, _)| score >= MIN_RELEVANCE)
            .collect();

        scored.sort_by(|&(score_a, idx_a), &(score_b, idx_b)| {
            let a = &entries[idx_a];
            let b = &entries[idx_b];
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| b.use_count.cmp(&a.use_count))
                .then_with(|| a.created.cmp(&b.created))
        });
        scored.truncate(per_category);
        scored
    }
}
