use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application-level constants
pub const APP_NAME: &str = "AER Audit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extraction schema version stamped into every cache fingerprint.
/// Bump whenever row extraction changes shape so stale entries re-extract.
pub const CACHE_SCHEMA_VERSION: u32 = 5;

/// Cache file name inside the data directory.
pub const CACHE_FILE_NAME: &str = "aer_cache.json";

/// Manual override (status/notes) file name inside the data directory.
pub const NOTES_FILE_NAME: &str = "aer_manual_notes.json";

/// Substring (case-insensitive) that marks the review sheet in a workbook.
pub const DEFAULT_SHEET_MARKER: &str = "user listing";

/// Reviewer-level folder names that never hold a reviewer's review.
pub const DEFAULT_EXCLUDED_FOLDERS: &[&str] =
    &["forms", "_private", "user listings", "audit logs", "audit"];

/// Get the application data directory.
/// ~/AER/ when a home directory is known, ./AER otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("AER")
}

/// Default cache file location.
pub fn cache_path() -> PathBuf {
    app_data_dir().join(CACHE_FILE_NAME)
}

/// Default manual notes file location.
pub fn notes_path() -> PathBuf {
    app_data_dir().join(NOTES_FILE_NAME)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,aer_audit=debug"
}

// ═══════════════════════════════════════════════════════════
// Scan configuration
// ═══════════════════════════════════════════════════════════

/// Tunables for one scan run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Reuse fresh cache entries. When false every entity re-extracts
    /// (the cache is still refreshed with the new results).
    pub use_cache: bool,
    /// Entities processed concurrently. 1 reproduces sequential scanning.
    pub max_workers: usize,
    /// Upper bound for one entity's remote work (listing, download, parse).
    pub entity_timeout_secs: u64,
    /// Folder names skipped during reviewer discovery (compared lower-cased).
    pub excluded_folders: Vec<String>,
    /// Marker substring used to pick the review sheet.
    pub sheet_marker: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            max_workers: 4,
            entity_timeout_secs: 120,
            excluded_folders: DEFAULT_EXCLUDED_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sheet_marker: DEFAULT_SHEET_MARKER.to_string(),
        }
    }
}

impl ScanConfig {
    /// Defaults overlaid with `AER_USE_CACHE`, `AER_MAX_WORKERS` and
    /// `AER_ENTITY_TIMEOUT_SECS`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<bool>("AER_USE_CACHE") {
            config.use_cache = v;
        }
        if let Some(v) = env_parse::<usize>("AER_MAX_WORKERS") {
            config.max_workers = v;
        }
        if let Some(v) = env_parse::<u64>("AER_ENTITY_TIMEOUT_SECS") {
            config.entity_timeout_secs = v;
        }

        config
    }

    pub fn entity_timeout(&self) -> Duration {
        Duration::from_secs(self.entity_timeout_secs.max(1))
    }

    /// Worker count clamped to at least one.
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn is_excluded_folder(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        self.excluded_folders
            .iter()
            .any(|f| f.trim().to_lowercase() == lowered)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
