use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CACHE_SCHEMA_VERSION;
use crate::models::{AuditSnapshot, EntityKey, RemoteFingerprint, ReviewRow};
use crate::pipeline::classify::OutcomeCounts;

/// Cached snapshot of one entity's last successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: EntityKey,
    pub fingerprint: RemoteFingerprint,
    pub rows: Vec<ReviewRow>,
    /// Counts at extraction time. Display only: readers recompute from `rows`.
    #[serde(default)]
    pub stats: OutcomeCounts,
    #[serde(default)]
    pub audit: AuditSnapshot,
}

impl CacheEntry {
    pub fn new(
        key: EntityKey,
        fingerprint: RemoteFingerprint,
        rows: Vec<ReviewRow>,
        audit: AuditSnapshot,
    ) -> Self {
        let stats = OutcomeCounts::from_rows(&rows);
        Self {
            key,
            fingerprint,
            rows,
            stats,
            audit,
        }
    }
}

/// On-disk layout of the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    /// Engine schema version the document was written with.
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}
