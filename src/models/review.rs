//! Core review records shared by extraction, caching and reporting.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Entity identity
// ═══════════════════════════════════════════

/// One reviewer's review folder within one application within one category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub category: String,
    pub application: String,
    pub reviewer: String,
}

impl EntityKey {
    pub fn new(
        category: impl Into<String>,
        application: impl Into<String>,
        reviewer: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            application: application.into(),
            reviewer: reviewer.into(),
        }
    }

    /// Cache index form: `category|application|reviewer`.
    pub fn cache_key(&self) -> String {
        format!("{}|{}|{}", self.category, self.application, self.reviewer)
    }

    /// Owning application of this entity.
    pub fn app_key(&self) -> AppKey {
        AppKey {
            category: self.category.clone(),
            application: self.application.clone(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} > {} > {}", self.category, self.application, self.reviewer)
    }
}

/// (category, application) pair that owns a rollup node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppKey {
    pub category: String,
    pub application: String,
}

impl AppKey {
    pub fn new(category: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            application: application.into(),
        }
    }

    /// Label used for manual notes: `Category > Application`.
    pub fn label(&self) -> String {
        format!("{} > {}", self.category, self.application)
    }
}

impl std::fmt::Display for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

// ═══════════════════════════════════════════
// Freshness
// ═══════════════════════════════════════════

/// Remote last-modified stamp plus the extraction schema version.
/// Two fingerprints are equal only when both parts match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteFingerprint {
    pub last_modified: String,
    pub version: u32,
}

impl RemoteFingerprint {
    pub fn new(last_modified: impl Into<String>, version: u32) -> Self {
        Self {
            last_modified: last_modified.into(),
            version,
        }
    }

    /// Fingerprint under the current schema version.
    pub fn current(last_modified: impl Into<String>) -> Self {
        Self::new(last_modified, crate::config::CACHE_SCHEMA_VERSION)
    }
}

// ═══════════════════════════════════════════
// Rows & audit
// ═══════════════════════════════════════════

/// One line of a reviewer's spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReviewRow {
    pub reviewer: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    pub response: String,
    #[serde(default)]
    pub details: String,
    pub is_missing: bool,
    /// 1-based row number in the source sheet.
    pub row_number: u32,
    pub file_name: String,
    pub folder_url: String,
}

impl ReviewRow {
    /// A row is missing when its response is blank after trimming.
    pub fn response_missing(response: &str) -> bool {
        response.trim().is_empty()
    }

    /// Recompute `is_missing` from the response text.
    pub fn normalized(mut self) -> Self {
        self.is_missing = Self::response_missing(&self.response);
        self
    }
}

/// File provenance captured when the file was extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditSnapshot {
    #[serde(default)]
    pub created_ts: Option<String>,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub modifier: String,
    /// Human-readable version history.
    #[serde(default)]
    pub log: String,
}
