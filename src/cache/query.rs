//! Query operations over the cache store: similarity search, tag
//! conjunction lookup, and hierarchy traversal.
//!
//! Every operation here degrades gracefully: lookup failures and stale
//! index references read as absent, and a broken parent chain ends the
//! walk instead of erroring.

use tracing::debug;

use super::entry::{CacheEntry, CacheLevel};
use super::index::{TagIndex, parent_tag};
use super::store::CacheStore;

/// One similarity-search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: CacheEntry,
    /// Score against the query, in `[0.0, 1.0]`.
    pub score: f32,
}

impl CacheStore {
    /// Scan a level for entries similar to `query`.
    ///
    /// When `tags` is given, only entries carrying every requested tag
    /// are scored. Hits below `threshold` are dropped; the rest are
    /// returned in descending score order. Ties keep the scan order
    /// (lexicographic by id), which makes results stable across runs.
    pub async fn search(
        &self,
        query: &str,
        level: CacheLevel,
        tags: Option<&[String]>,
        threshold: f32,
    ) -> Vec<SearchHit> {
        let entries = self.list_entries(level).await;
        let mut hits: Vec<SearchHit> = entries
            .into_iter()
            .filter(|entry| tags.is_none_or(|tags| entry.has_all_tags(tags)))
            .map(|entry| {
                let score = self.scorer.score(query, &entry.content);
                SearchHit { entry, score }
            })
            .filter(|hit| hit.score >= threshold)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// Entries at `level` carrying every one of the given tags, resolved
    /// through the tag index. Stale index references (entries deleted
    /// since the last rebuild) are silently skipped.
    pub async fn find_by_tags(&self, tags: &[String], level: CacheLevel) -> Vec<CacheEntry> {
        let index = TagIndex::load(&self.level_dir(level)).await;
        let mut entries = Vec::new();
        for id in index.lookup_all(tags) {
            if let Some(entry) = self.get(&id, level).await {
                entries.push(entry);
            } else {
                debug!(%id, %level, "stale index reference skipped");
            }
        }
        entries
    }

    /// The hierarchy chain through an entry: ancestors first (oldest
    /// ancestor to direct parent), then the entry itself, then its direct
    /// children one level up.
    ///
    /// An unknown `id` yields an empty list. A dangling `parent_id`
    /// (parent evicted) ends the upward walk without error.
    pub async fn hierarchy(&self, id: &str, level: CacheLevel) -> Vec<CacheEntry> {
        let Some(entry) = self.get(id, level).await else {
            return Vec::new();
        };

        let mut ancestors = Vec::new();
        let mut current = entry.clone();
        let mut current_level = level;
        while let (Some(parent_id), Some(parent_level)) =
            (current.parent_id.clone(), current_level.parent())
        {
            match self.get(&parent_id, parent_level).await {
                Some(parent) => {
                    ancestors.push(parent.clone());
                    current = parent;
                    current_level = parent_level;
                }
                None => {
                    debug!(%parent_id, %parent_level, "parent chain broken, stopping walk");
                    break;
                }
            }
        }
        ancestors.reverse();

        let mut chain = ancestors;
        chain.push(entry);

        if let Some(child_level) = level.child() {
            let index = TagIndex::load(&self.level_dir(child_level)).await;
            for child_id in index.lookup_all(&[parent_tag(id)]) {
                if let Some(child) = self.get(&child_id, child_level).await
                    && child.parent_id.as_deref() == Some(id)
                {
                    chain.push(child);
                }
            }
        }

        chain
    }
}
