use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manifest contents keyed by cache key.
pub type Entries = BTreeMap<String, CacheEntry>;

/// Validators and bookkeeping for one successfully cached asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag:          Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub size:          u64,
    pub downloaded_at: DateTime<Utc>,
    pub checked_at:    DateTime<Utc>,
}

impl CacheEntry {
    /// Entry for bytes that were just written to disk.
    pub fn downloaded(
        etag: Option<String>,
        last_modified: Option<String>,
        size: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            etag,
            last_modified,
            size,
            downloaded_at: now,
            checked_at: now,
        }
    }

    /// The same entry, confirmed unchanged by the origin at `now`.
    #[must_use]
    pub fn revalidated(&self, now: DateTime<Utc>) -> Self {
        Self {
            checked_at: now,
            ..self.clone()
        }
    }

    /// Whether a conditional request can be built from this entry.
    pub fn has_validators(&self) -> bool { self.etag.is_some() || self.last_modified.is_some() }

    /// Equality ignoring `checked_at`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.etag == other.etag
            && self.last_modified == other.last_modified
            && self.size == other.size
            && self.downloaded_at == other.downloaded_at
    }
}
