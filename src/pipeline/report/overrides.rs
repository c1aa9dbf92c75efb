//! Manual overrides: operator-entered application status and notes.
//!
//! Stored as one JSON object keyed by `"Category > Application"`:
//!
//! ```json
//! { "Finance > Ledger": { "app_status": "Force Completed", "app_note": "...",
//!                         "reviewers": { "alice": "on leave" } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AppKey, AppStatus};
use crate::pipeline::cache::{write_json_atomic, CacheError};

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("Could not save overrides: {0}")]
    Save(#[from] CacheError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOverride {
    #[serde(default)]
    pub app_status: AppStatus,
    #[serde(default)]
    pub app_note: String,
    /// Reviewer name → note.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reviewers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManualOverrides {
    apps: BTreeMap<String, AppOverride>,
}

impl ManualOverrides {
    /// Load from `path`. Missing or unreadable files give no overrides.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Overrides unreadable, ignoring");
                return Self::default();
            }
        };

        match serde_json::from_slice::<Self>(&bytes) {
            Ok(overrides) => {
                tracing::debug!(path = %path.display(), apps = overrides.apps.len(), "Overrides loaded");
                overrides
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Overrides corrupt, ignoring");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), OverrideError> {
        write_json_atomic(path, self)?;
        tracing::info!(path = %path.display(), apps = self.apps.len(), "Overrides saved");
        Ok(())
    }

    pub fn get(&self, app: &AppKey) -> Option<&AppOverride> {
        self.apps.get(&app.label())
    }

    pub fn set(&mut self, app: &AppKey, value: AppOverride) {
        self.apps.insert(app.label(), value);
    }

    pub fn set_status(&mut self, app: &AppKey, status: AppStatus) {
        self.apps.entry(app.label()).or_default().app_status = status;
    }

    pub fn set_reviewer_note(&mut self, app: &AppKey, reviewer: &str, note: impl Into<String>) {
        self.apps
            .entry(app.label())
            .or_default()
            .reviewers
            .insert(reviewer.to_string(), note.into());
    }

    pub fn reviewer_note(&self, app: &AppKey, reviewer: &str) -> Option<&str> {
        self.get(app)?.reviewers.get(reviewer).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_legacy_document_without_reviewer_notes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(
            &path,
            r#"{"Finance > Ledger": {"app_status": "Action Required", "app_note": "chase"}}"#,
        )
        .unwrap();

        let overrides = ManualOverrides::load(&path);
        let app = AppKey::new("Finance", "Ledger");
        let entry = overrides.get(&app).unwrap();
        assert_eq!(entry.app_status, AppStatus::ActionRequired);
        assert_eq!(entry.app_note, "chase");
        assert_eq!(overrides.reviewer_note(&app, "alice"), None);
    }

    #[test]
    fn missing_or_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ManualOverrides::load(&dir.path().join("absent.json")).is_empty());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ManualOverrides::load(&path).is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.json");
        let app = AppKey::new("HR", "Payroll");

        let mut overrides = ManualOverrides::default();
        overrides.set_status(&app, AppStatus::ForceCompleted);
        overrides.set_reviewer_note(&app, "bob", "left company");
        overrides.save(&path).unwrap();

        let loaded = ManualOverrides::load(&path);
        assert_eq!(loaded, overrides);
        assert_eq!(loaded.reviewer_note(&app, "bob"), Some("left company"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"HR > Payroll\""));
        assert!(raw.contains("\"Force Completed\""));
    }
}
