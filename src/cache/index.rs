//! Per-level tag index: tag → set of entry ids.
//!
//! One `index.json` lives in each level directory. The index is derived
//! state — it can always be rebuilt by scanning the level's entries — so
//! a missing or corrupt index file is treated as empty, never as a fatal
//! error.
//!
//! Besides the entry's own tags, the index records each child entry under
//! a synthetic `parent:<parent_id>` tag derived from `parent_id`. That
//! makes hierarchy child-walks an index intersection instead of a level
//! scan. Synthetic tags never appear in `CacheEntry::tags`; `rebuild`
//! regenerates them from the entry records, so the derivation stays
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use crate::errors::CacheError;

/// File name of the index record inside a level directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Prefix of the synthetic tag linking children to a parent entry.
pub const PARENT_TAG_PREFIX: &str = "parent:";

/// The synthetic index tag for children of `parent_id`.
pub fn parent_tag(parent_id: &str) -> String {
    format!("{}{}", PARENT_TAG_PREFIX, parent_id)
}

/// Tag index for a single cache level.
///
/// `BTreeMap`/`BTreeSet` keep serialization byte-stable: rebuilding from
/// the same entry set always produces an identical file, regardless of
/// the order entries were scanned in.
#[derive(Debug, Clone)]
pub struct TagIndex {
    path: PathBuf,
    map: BTreeMap<String, BTreeSet<String>>,
}

impl TagIndex {
    /// Load the index for a level directory. A missing file is an empty
    /// index; an unreadable or corrupt file is logged and also treated as
    /// empty (it self-heals on the next rebuild).
    pub async fn load(level_dir: &Path) -> Self {
        let path = level_dir.join(INDEX_FILE_NAME);
        let map = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt tag index, treating as empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable tag index, treating as empty");
                BTreeMap::new()
            }
        };
        Self { path, map }
    }

    /// Build an index in memory from the authoritative entry set of a
    /// level. Idempotent; ordering of `entries` does not affect the
    /// result.
    pub fn rebuild(level_dir: &Path, entries: &[CacheEntry]) -> Self {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in entries {
            for tag in index_tags(entry) {
                map.entry(tag).or_default().insert(entry.id.clone());
            }
        }
        Self {
            path: level_dir.join(INDEX_FILE_NAME),
            map,
        }
    }

    /// Record `id` under each of the given tags.
    pub fn insert<I, S>(&mut self, id: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.map.entry(tag.into()).or_default().insert(id.to_string());
        }
    }

    /// Ids present under **every** one of the requested tags.
    ///
    /// Zero requested tags yields the empty set: an unconstrained lookup
    /// is almost always a caller bug, and "everything at this level" is
    /// available through a store scan instead.
    pub fn lookup_all(&self, tags: &[String]) -> BTreeSet<String> {
        let mut iter = tags.iter();
        let Some(first) = iter.next() else {
            return BTreeSet::new();
        };
        let mut result = match self.map.get(first) {
            Some(ids) => ids.clone(),
            None => return BTreeSet::new(),
        };
        for tag in iter {
            match self.map.get(tag) {
                Some(ids) => result.retain(|id| ids.contains(id)),
                None => return BTreeSet::new(),
            }
            if result.is_empty() {
                return result;
            }
        }
        result
    }

    /// Persist the index to its level directory.
    pub async fn save(&self) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| CacheError::IndexWriteFailed {
                    path: self.path.clone(),
                    source,
                })?;
        }
        let json = serde_json::to_string_pretty(&self.map).map_err(CacheError::Serialize)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| CacheError::IndexWriteFailed {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), tags = self.map.len(), "tag index saved");
        Ok(())
    }

    /// Number of distinct tags.
    pub fn tag_count(&self) -> usize {
        self.map.len()
    }

    /// Whether the index maps no tags at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The tags an entry is indexed under: its own tags plus the synthetic
/// parent link, when it has a parent.
pub fn index_tags(entry: &CacheEntry) -> Vec<String> {
    let mut tags: Vec<String> = entry.tags.iter().cloned().collect();
    if let Some(parent_id) = &entry.parent_id {
        tags.push(parent_tag(parent_id));
    }
    tags
}
