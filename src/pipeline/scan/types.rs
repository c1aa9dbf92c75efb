//! Core types for a scan run:
//! Target → Entity → EntityResult → ScanReport.

use serde::{Deserialize, Serialize};

use super::error::ScanError;
use crate::models::{AuditSnapshot, EntityKey, EntityState, RemoteFingerprint, ReviewRow};
use crate::pipeline::classify::OutcomeCounts;
use crate::pipeline::report::Aggregate;

// ═══════════════════════════════════════════
// Remote listings (external collaborator shapes)
// ═══════════════════════════════════════════

/// A reviewer folder inside an application folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub name: String,
    pub web_url: String,
}

/// A spreadsheet file inside a reviewer folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    /// Opaque last-modified stamp; compared for equality only.
    pub last_modified: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub web_url: String,
}

// ═══════════════════════════════════════════
// Targets
// ═══════════════════════════════════════════

/// An application folder to scan; reviewers are discovered beneath `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub category: String,
    pub application: String,
    pub path: String,
}

impl ScanTarget {
    pub fn new(
        category: impl Into<String>,
        application: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            application: application.into(),
            path: path.into(),
        }
    }
}

/// One entity ready to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTarget {
    pub key: EntityKey,
    /// Remote path of the reviewer folder.
    pub folder_path: String,
    /// Browser link to the reviewer folder.
    pub folder_url: String,
}

// ═══════════════════════════════════════════
// Results
// ═══════════════════════════════════════════

/// Outcome of one entity that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResult {
    pub key: EntityKey,
    pub state: EntityState,
    pub folder_url: String,
    pub file_name: Option<String>,
    pub fingerprint: Option<RemoteFingerprint>,
    pub rows: Vec<ReviewRow>,
    pub audit: AuditSnapshot,
    /// Always recomputed from `rows`, whatever the source.
    pub counts: OutcomeCounts,
}

impl EntityResult {
    /// No spreadsheet in the reviewer folder.
    pub fn skipped(target: &EntityTarget) -> Self {
        Self {
            key: target.key.clone(),
            state: EntityState::Skipped,
            folder_url: target.folder_url.clone(),
            file_name: None,
            fingerprint: None,
            rows: Vec::new(),
            audit: AuditSnapshot::default(),
            counts: OutcomeCounts::default(),
        }
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Every row carries a response.
    pub fn is_complete(&self) -> bool {
        self.counts.is_complete()
    }
}

/// Whether a run had anything to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    /// No targets given, or discovery found no entities.
    NoTargets,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub run_id: String,
    pub status: ScanStatus,
    /// Successful entities, sorted by key.
    pub results: Vec<EntityResult>,
    /// Failures, sorted by category, application, reviewer.
    pub errors: Vec<ScanError>,
    pub aggregate: Aggregate,
    pub hits: u32,
    pub fresh: u32,
    pub skipped: u32,
    /// True when the cache file was rewritten at the end of the run.
    pub cache_persisted: bool,
    /// Set when the cache could not be written. The report is still valid.
    pub cache_error: Option<String>,
    pub duration_ms: u64,
}

impl ScanReport {
    pub fn empty(run_id: String) -> Self {
        Self {
            run_id,
            status: ScanStatus::NoTargets,
            results: Vec::new(),
            errors: Vec::new(),
            aggregate: Aggregate::new(),
            hits: 0,
            fresh: 0,
            skipped: 0,
            cache_persisted: false,
            cache_error: None,
            duration_ms: 0,
        }
    }

    pub fn result(&self, key: &EntityKey) -> Option<&EntityResult> {
        self.results.iter().find(|r| &r.key == key)
    }
}

// ═══════════════════════════════════════════
// Progress events
// ═══════════════════════════════════════════

/// Emitted by the coordinator while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    Started {
        entity_count: u32,
    },
    Progress {
        completed: u32,
        total: u32,
        current: String,
    },
    Completed {
        hits: u32,
        fresh: u32,
        failed: u32,
        duration_ms: u64,
    },
}

/// Progress callback accepted by the coordinator.
pub type ProgressFn<'a> = &'a (dyn Fn(ScanEvent) + Send + Sync);
