//! Durable hierarchical cache store.
//!
//! Entries are JSON records, one file per entry, under one directory per
//! level (`raw/`, `structured/`, `summary/`, `meta/`), each with its own
//! `index.json` tag index.
//!
//! Write ordering inside `store()`: the entry record is durably written
//! before the index is touched. A crash between the two leaves an entry
//! the tag index does not know about (unreachable via tag search until the
//! next rebuild) rather than an index referencing a missing entry.
//!
//! No cross-process locking is performed. Concurrent `store()`/`cleanup()`
//! calls on the same level can lose index updates; callers that need
//! multi-writer access must serialize cache mutations per level.

use chrono::{Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheLevel, EntryMetadata, compute_id};
use super::index::{TagIndex, index_tags};
use crate::errors::CacheError;
use crate::similarity::{BigramScorer, SimilarityScorer};

/// File-backed cache store partitioned into four ordered levels.
pub struct CacheStore {
    root: PathBuf,
    /// Cost per token recorded in entry metadata. Zero disables cost
    /// computation.
    per_token_cost: f64,
    /// Model identifier stamped on stored entries.
    model: Option<String>,
    /// Scorer used by similarity search.
    pub(crate) scorer: Box<dyn SimilarityScorer>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("per_token_cost", &self.per_token_cost)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first write; a store over a nonexistent root reads as empty.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            per_token_cost: 0.0,
            model: None,
            scorer: Box::new(BigramScorer),
        }
    }

    /// Record `model` on stored entries and compute costs at
    /// `per_token_cost` per token.
    pub fn with_model(mut self, model: impl Into<String>, per_token_cost: f64) -> Self {
        self.model = Some(model.into());
        self.per_token_cost = per_token_cost;
        self
    }

    /// Replace the similarity scorer used by `search`.
    pub fn with_scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// The store's root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub(crate) fn level_dir(&self, level: CacheLevel) -> PathBuf {
        self.root.join(level.dir_name())
    }

    fn entry_path(&self, id: &str, level: CacheLevel) -> PathBuf {
        self.level_dir(level).join(format!("{}.json", id))
    }

    /// Store content at a level, updating that level's tag index.
    ///
    /// The id is derived from the content, so storing identical content
    /// at the same level is idempotent (the record is overwritten in
    /// place). Returns the entry as persisted, including computed
    /// metadata.
    pub async fn store(
        &self,
        level: CacheLevel,
        content: &str,
        tags: &[String],
        parent_id: Option<String>,
        tokens_used: Option<u32>,
    ) -> Result<CacheEntry, CacheError> {
        let id = compute_id(content);
        let cost = match (tokens_used, self.per_token_cost) {
            (Some(tokens), cost_per_token) if cost_per_token > 0.0 => {
                Some(f64::from(tokens) * cost_per_token)
            }
            _ => None,
        };
        let entry = CacheEntry {
            id: id.clone(),
            level,
            content: content.to_string(),
            tags: tags.iter().cloned().collect(),
            parent_id,
            metadata: EntryMetadata {
                created_at: Utc::now(),
                tokens_used,
                model: self.model.clone(),
                cost,
            },
        };

        // Entry record first, durably, then the index.
        let path = self.entry_path(&id, level);
        let dir = self.level_dir(level);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::EntryWriteFailed {
                path: path.clone(),
                source,
            })?;
        let json = serde_json::to_string_pretty(&entry).map_err(CacheError::Serialize)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| CacheError::EntryWriteFailed {
                path: path.clone(),
                source,
            })?;

        let mut index = TagIndex::load(&dir).await;
        index.insert(&id, index_tags(&entry));
        index.save().await?;

        debug!(%id, %level, tags = tags.len(), "cache entry stored");
        Ok(entry)
    }

    /// Point lookup. Absence is `None`, not an error; a corrupt record is
    /// logged and also reads as `None` (the next cleanup pass purges it).
    pub async fn get(&self, id: &str, level: CacheLevel) -> Option<CacheEntry> {
        let path = self.entry_path(id, level);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable cache entry");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(path = %path.display(), %err, "corrupt cache entry");
                None
            }
        }
    }

    /// Delete an entry. Deleting an absent entry is a no-op. The tag
    /// index is left alone: stale references are skipped by readers and
    /// purged by the next rebuild.
    pub async fn invalidate(&self, id: &str, level: CacheLevel) -> Result<(), CacheError> {
        let path = self.entry_path(id, level);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%id, %level, "cache entry invalidated");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Other(anyhow::Error::new(err).context(
                format!("Failed to delete cache entry {}", path.display()),
            ))),
        }
    }

    /// All parseable entries at a level, in lexicographic id order (which
    /// makes downstream tie-breaking deterministic). Corrupt records are
    /// logged and skipped.
    pub async fn list_entries(&self, level: CacheLevel) -> Vec<CacheEntry> {
        let dir = self.level_dir(level);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(_) => return Vec::new(),
        };

        let mut paths = Vec::new();
        while let Ok(Some(dirent)) = read_dir.next_entry().await {
            let path = dirent.path();
            let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
            let is_index = path
                .file_name()
                .map(|n| n == super::index::INDEX_FILE_NAME)
                .unwrap_or(false);
            if is_json && !is_index {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<CacheEntry>(&content) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        warn!(path = %path.display(), %err, "corrupt cache entry skipped");
                    }
                },
                Err(err) => {
                    warn!(path = %path.display(), %err, "unreadable cache entry skipped");
                }
            }
        }
        entries
    }

    /// Remove entries older than `max_age` from every level, then rebuild
    /// each level's tag index from what survived.
    ///
    /// Levels are cleaned independently: a failure in one is recorded in
    /// the report and the remaining levels still run. Not safe to run
    /// concurrently with itself or with stores at the same level.
    pub async fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let mut report = CleanupReport::default();
        for level in CacheLevel::all() {
            match self.cleanup_level(level, max_age).await {
                Ok(removed) => report.removed.push((level, removed)),
                Err(err) => {
                    warn!(%level, %err, "cleanup failed for level, continuing");
                    report.failures.push((level, err.to_string()));
                }
            }
        }
        report
    }

    async fn cleanup_level(
        &self,
        level: CacheLevel,
        max_age: Duration,
    ) -> Result<usize, CacheError> {
        let now = Utc::now();
        let entries = self.list_entries(level).await;
        let mut kept = Vec::with_capacity(entries.len());
        let mut removed = 0usize;

        for entry in entries {
            if now - entry.metadata.created_at > max_age {
                self.invalidate(&entry.id, level).await?;
                removed += 1;
            } else {
                kept.push(entry);
            }
        }

        let index = TagIndex::rebuild(&self.level_dir(level), &kept);
        index.save().await?;

        if removed > 0 {
            debug!(%level, removed, kept = kept.len(), "cleanup pass complete");
        }
        Ok(removed)
    }

    /// Per-level counts and sizes, for status reporting.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for level in CacheLevel::all() {
            let entries = self.list_entries(level).await;
            let index = TagIndex::load(&self.level_dir(level)).await;
            let bytes = entries.iter().map(|e| e.content.len()).sum();
            let oldest = entries.iter().map(|e| e.metadata.created_at).min();
            let newest = entries.iter().map(|e| e.metadata.created_at).max();
            stats.levels.push(LevelStats {
                level,
                entries: entries.len(),
                content_bytes: bytes,
                tags: index.tag_count(),
                oldest,
                newest,
            });
        }
        stats
    }
}

/// Outcome of one cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Entries removed per level.
    pub removed: Vec<(CacheLevel, usize)>,
    /// Levels whose cleanup failed, with the failure message.
    pub failures: Vec<(CacheLevel, String)>,
}

impl CleanupReport {
    /// Total entries removed across all levels.
    pub fn total_removed(&self) -> usize {
        self.removed.iter().map(|(_, n)| n).sum()
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Removed {} entries across {} levels ({} failures)",
            self.total_removed(),
            self.removed.len(),
            self.failures.len()
        )
    }
}

/// Statistics for one level.
#[derive(Debug)]
pub struct LevelStats {
    pub level: CacheLevel,
    pub entries: usize,
    pub content_bytes: usize,
    pub tags: usize,
    pub oldest: Option<chrono::DateTime<Utc>>,
    pub newest: Option<chrono::DateTime<Utc>>,
}

/// Statistics across all levels.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub levels: Vec<LevelStats>,
}

impl CacheStats {
    /// Total entries across all levels.
    pub fn total_entries(&self) -> usize {
        self.levels.iter().map(|l| l.entries).sum()
    }
}
