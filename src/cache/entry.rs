//! Cache entry model: levels, metadata, and content fingerprinting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::errors::CacheError;

/// The four cache levels, ordered from least to most condensed.
///
/// An entry's level is assigned exactly once, at store time, and never
/// changes. Entries may link to a parent exactly one level below, so the
/// hierarchy can never form a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLevel {
    /// Raw model responses as received.
    Raw,
    /// Structured extractions from raw responses.
    Structured,
    /// Condensed summaries.
    Summary,
    /// Summaries of summaries.
    Meta,
}

impl CacheLevel {
    /// All levels, lowest first.
    pub fn all() -> [CacheLevel; 4] {
        [
            CacheLevel::Raw,
            CacheLevel::Structured,
            CacheLevel::Summary,
            CacheLevel::Meta,
        ]
    }

    /// Numeric form, 0 through 3.
    pub fn as_u8(self) -> u8 {
        match self {
            CacheLevel::Raw => 0,
            CacheLevel::Structured => 1,
            CacheLevel::Summary => 2,
            CacheLevel::Meta => 3,
        }
    }

    /// Directory name for this level under the cache root.
    pub fn dir_name(self) -> &'static str {
        match self {
            CacheLevel::Raw => "raw",
            CacheLevel::Structured => "structured",
            CacheLevel::Summary => "summary",
            CacheLevel::Meta => "meta",
        }
    }

    /// The level one below, where a parent entry would live.
    pub fn parent(self) -> Option<CacheLevel> {
        match self {
            CacheLevel::Raw => None,
            CacheLevel::Structured => Some(CacheLevel::Raw),
            CacheLevel::Summary => Some(CacheLevel::Structured),
            CacheLevel::Meta => Some(CacheLevel::Summary),
        }
    }

    /// The level one above, where child entries would live.
    pub fn child(self) -> Option<CacheLevel> {
        match self {
            CacheLevel::Raw => Some(CacheLevel::Structured),
            CacheLevel::Structured => Some(CacheLevel::Summary),
            CacheLevel::Summary => Some(CacheLevel::Meta),
            CacheLevel::Meta => None,
        }
    }
}

impl TryFrom<u8> for CacheLevel {
    type Error = CacheError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CacheLevel::Raw),
            1 => Ok(CacheLevel::Structured),
            2 => Ok(CacheLevel::Summary),
            3 => Ok(CacheLevel::Meta),
            level => Err(CacheError::InvalidLevel { level }),
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl std::str::FromStr for CacheLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "0" => Ok(CacheLevel::Raw),
            "structured" | "1" => Ok(CacheLevel::Structured),
            "summary" | "2" => Ok(CacheLevel::Summary),
            "meta" | "meta-summary" | "3" => Ok(CacheLevel::Meta),
            _ => anyhow::bail!(
                "Invalid cache level '{}'. Valid values: raw, structured, summary, meta (or 0-3)",
                s
            ),
        }
    }
}

/// Metadata recorded alongside an entry at store time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// Tokens consumed producing the content, if the caller knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    /// Model that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Computed cost: `tokens_used × per-token cost` of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// A single cached artifact.
///
/// Entries are read-only after creation; the store never mutates a
/// persisted record, only deletes it (explicitly or by age).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content fingerprint, unique within a level.
    pub id: String,
    /// Level this entry lives at. Immutable.
    pub level: CacheLevel,
    /// The stored text.
    pub content: String,
    /// Retrieval tags. Ordering-independent.
    pub tags: BTreeSet<String>,
    /// Optional link to an entry one level below. May dangle after the
    /// parent is evicted; traversal tolerates that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Whether this entry carries every one of the given tags.
    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }
}

/// Compute an entry id: the first 12 hex characters of the SHA-256 of the
/// content. Deterministic, so re-storing identical content at the same
/// level is idempotent.
pub fn compute_id(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..12].to_string()
}
