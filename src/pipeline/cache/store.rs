use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use super::types::{CacheDocument, CacheEntry};
use super::CacheError;
use crate::config::CACHE_SCHEMA_VERSION;
use crate::models::{EntityKey, RemoteFingerprint};

/// In-memory cache backed by a single JSON file.
///
/// Owned by the scan coordinator for the duration of a run; there is no
/// process-wide instance.
#[derive(Debug, Default)]
pub struct CacheStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl CacheStore {
    /// Store with no backing file. `persist` only clears the dirty flag.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the whole store from `path`.
    ///
    /// Never fails: a missing, unreadable, corrupt or foreign-version file
    /// yields an empty store that will be rebuilt by the next scan.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => decode(&path, &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No cache file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache file unreadable, starting empty");
                BTreeMap::new()
            }
        };

        tracing::info!(path = %path.display(), entries = entries.len(), "Cache loaded");

        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when an entry was written since load or the last persist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The entry stored for exactly `key`. Distinct keys can share a flat
    /// cache key when a name contains `|`; such an entry is not returned.
    pub fn get(&self, key: &EntityKey) -> Option<&CacheEntry> {
        self.entries.get(&key.cache_key()).filter(|e| e.key == *key)
    }

    /// Insert or overwrite the entry under its own key.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.key.cache_key(), entry);
        self.dirty = true;
    }

    pub fn remove(&mut self, key: &EntityKey) -> Option<CacheEntry> {
        let flat = key.cache_key();
        if !matches!(self.entries.get(&flat), Some(e) if e.key == *key) {
            return None;
        }
        let removed = self.entries.remove(&flat);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// An entry is reusable only when its fingerprint (timestamp and schema
    /// version) equals the live one and it holds at least one row. Empty
    /// entries are inconclusive: they may record a transient parse failure.
    pub fn is_fresh(entry: &CacheEntry, live: &RemoteFingerprint) -> bool {
        entry.fingerprint == *live && !entry.rows.is_empty()
    }

    /// The entry for `key` when it is fresh against `live`.
    pub fn fresh_entry(&self, key: &EntityKey, live: &RemoteFingerprint) -> Option<&CacheEntry> {
        self.get(key).filter(|e| Self::is_fresh(e, live))
    }

    /// Write the store if dirty. Returns whether a write happened.
    ///
    /// The document goes to a temp file in the target directory, is synced,
    /// then renamed over the old file, so a crash leaves either the old or the
    /// new store on disk and never a partial one.
    pub fn persist(&mut self) -> Result<bool, CacheError> {
        if !self.dirty {
            return Ok(false);
        }
        let Some(path) = self.path.clone() else {
            self.dirty = false;
            return Ok(false);
        };

        let document = CacheDocument {
            version: CACHE_SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        write_json_atomic(&path, &document)?;

        self.dirty = false;
        tracing::info!(path = %path.display(), entries = self.entries.len(), "Cache persisted");
        Ok(true)
    }
}

/// Pretty-print `value` to a temp file beside `path`, sync it, then rename
/// it over `path`. Parent directories are created as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

fn decode(path: &Path, bytes: &[u8]) -> BTreeMap<String, CacheEntry> {
    let document: CacheDocument = match serde_json::from_slice(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file corrupt, starting empty");
            return BTreeMap::new();
        }
    };

    if document.version != CACHE_SCHEMA_VERSION {
        tracing::info!(
            found = document.version,
            expected = CACHE_SCHEMA_VERSION,
            "Cache written by another schema version, starting empty"
        );
        return BTreeMap::new();
    }

    // Re-key from the entries themselves so a hand-edited map key cannot
    // shadow another entity.
    document
        .entries
        .into_values()
        .map(|entry| (entry.key.cache_key(), entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditSnapshot, ReviewRow};

    fn row(reviewer: &str, response: &str) -> ReviewRow {
        ReviewRow {
            reviewer: reviewer.into(),
            user_name: "User".into(),
            user_email: "user@example.com".into(),
            response: response.into(),
            details: String::new(),
            is_missing: response.trim().is_empty(),
            row_number: 2,
            file_name: format!("{reviewer}.xlsx"),
            folder_url: "#".into(),
        }
    }

    fn entry(reviewer: &str, modified: &str, rows: Vec<ReviewRow>) -> CacheEntry {
        CacheEntry::new(
            EntityKey::new("cat1", "app1", reviewer),
            RemoteFingerprint::current(modified),
            rows,
            AuditSnapshot {
                created_ts: Some("2026-01-01T00:00:00Z".into()),
                creator: "Owner".into(),
                modifier: "Editor".into(),
                log: "v1.0 Owner".into(),
            },
        )
    }

    #[test]
    fn fresh_requires_matching_fingerprint() {
        let e = entry("alice", "t1", vec![row("alice", "Approved")]);
        assert!(CacheStore::is_fresh(&e, &RemoteFingerprint::current("t1")));
        assert!(!CacheStore::is_fresh(&e, &RemoteFingerprint::current("t2")));
        assert!(!CacheStore::is_fresh(
            &e,
            &RemoteFingerprint::new("t1", CACHE_SCHEMA_VERSION + 1)
        ));
    }

    #[test]
    fn empty_rows_never_fresh() {
        let e = entry("alice", "t1", vec![]);
        assert!(!CacheStore::is_fresh(&e, &RemoteFingerprint::current("t1")));
    }

    #[test]
    fn put_marks_dirty_and_get_returns_entry() {
        let mut store = CacheStore::in_memory();
        assert!(!store.is_dirty());
        store.put(entry("alice", "t1", vec![row("alice", "ok")]));
        assert!(store.is_dirty());
        let key = EntityKey::new("cat1", "app1", "alice");
        assert_eq!(store.get(&key).unwrap().rows.len(), 1);
        assert!(store.fresh_entry(&key, &RemoteFingerprint::current("t1")).is_some());
        assert!(store.fresh_entry(&key, &RemoteFingerprint::current("t0")).is_none());
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut store = CacheStore::load(&path);
        assert!(store.is_empty());
        store.put(entry("alice", "t1", vec![row("alice", "Approved")]));
        store.put(entry("bob", "t2", vec![row("bob", "")]));
        assert!(store.persist().unwrap());
        assert!(!store.is_dirty());

        let reloaded = CacheStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        let alice = reloaded.get(&EntityKey::new("cat1", "app1", "alice")).unwrap();
        assert_eq!(alice.rows[0].response, "Approved");
        assert_eq!(alice.audit.creator, "Owner");
    }

    #[test]
    fn clean_store_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = CacheStore::load(&path);
        assert!(!store.persist().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn persist_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = CacheStore::load(&path);
        store.put(entry("alice", "t1", vec![row("alice", "ok")]));
        store.persist().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["cache.json".to_string()]);
    }

    #[test]
    fn persist_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let mut store = CacheStore::load(&path);
        store.put(entry("alice", "t1", vec![row("alice", "ok")]));
        assert!(store.persist().unwrap());
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let store = CacheStore::load(&path);
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn other_schema_version_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let doc = serde_json::json!({ "version": CACHE_SCHEMA_VERSION + 7, "entries": {} });
        std::fs::write(&path, doc.to_string()).unwrap();
        assert!(CacheStore::load(&path).is_empty());
    }

    #[test]
    fn file_is_keyed_by_pipe_joined_entity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = CacheStore::load(&path);
        store.put(entry("alice", "t1", vec![row("alice", "ok")]));
        store.persist().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], CACHE_SCHEMA_VERSION);
        assert!(raw["entries"]["cat1|app1|alice"].is_object());
    }

    #[test]
    fn remove_marks_dirty_only_when_present() {
        let mut store = CacheStore::in_memory();
        let key = EntityKey::new("cat1", "app1", "alice");
        assert!(store.remove(&key).is_none());
        assert!(!store.is_dirty());
        store.put(entry("alice", "t1", vec![row("alice", "ok")]));
        store.persist().unwrap();
        assert!(store.remove(&key).is_some());
        assert!(store.is_dirty());
    }

    #[test]
    fn pipe_in_names_does_not_share_entries() {
        let mut store = CacheStore::in_memory();
        let stored = EntityKey::new("a|b", "c", "d");
        let other = EntityKey::new("a", "b|c", "d");
        assert_eq!(stored.cache_key(), other.cache_key());

        store.put(CacheEntry::new(
            stored.clone(),
            RemoteFingerprint::current("t1"),
            vec![row("d", "Approved")],
            AuditSnapshot::default(),
        ));

        let live = RemoteFingerprint::current("t1");
        assert!(store.get(&other).is_none());
        assert!(store.fresh_entry(&other, &live).is_none());
        assert!(store.fresh_entry(&stored, &live).is_some());

        store.persist().unwrap();
        assert!(store.remove(&other).is_none());
        assert!(!store.is_dirty());
        assert_eq!(store.len(), 1);
    }
}
