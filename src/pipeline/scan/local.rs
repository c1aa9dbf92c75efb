//! `RemoteStore` over a local directory tree, e.g. a synced copy of the
//! review library laid out as `<root>/<category>/<application>/<reviewer>/*.xlsx`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::RemoteError;
use super::traits::RemoteStore;
use super::types::{RemoteFile, RemoteFolder, ScanTarget};
use crate::models::AuditSnapshot;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One target per `<category>/<application>` directory under the root.
    pub fn targets(&self) -> Result<Vec<ScanTarget>, RemoteError> {
        let mut targets = Vec::new();
        for category in sorted_entries(&self.root, true)? {
            let category_dir = self.root.join(&category);
            for application in sorted_entries(&category_dir, true)? {
                targets.push(ScanTarget::new(
                    &category,
                    &application,
                    format!("{category}/{application}"),
                ));
            }
        }
        Ok(targets)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl RemoteStore for LocalFolderStore {
    fn list_reviewer_folders(&self, path: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
        let dir = self.resolve(path);
        Ok(sorted_entries(&dir, true)?
            .into_iter()
            .map(|name| RemoteFolder {
                web_url: file_url(&dir.join(&name)),
                name,
            })
            .collect())
    }

    fn list_spreadsheet_files(&self, path: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        let dir = self.resolve(path);
        let mut files = Vec::new();

        for name in sorted_entries(&dir, false)? {
            if !is_spreadsheet(&name) {
                continue;
            }
            let full = dir.join(&name);
            let meta = std::fs::metadata(&full).map_err(|e| io_error(&full, e))?;
            let Some(modified) = meta.modified().ok().map(rfc3339) else {
                tracing::warn!(path = %full.display(), "No modification time, file skipped");
                continue;
            };
            files.push(RemoteFile {
                id: format!("{}/{name}", path.trim_end_matches('/')),
                web_url: file_url(&full),
                created: meta.created().ok().map(rfc3339),
                last_modified: modified,
                name,
            });
        }

        Ok(files)
    }

    fn download_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let full = self.resolve(path);
        std::fs::read(&full).map_err(|e| io_error(&full, e))
    }

    fn audit_snapshot(&self, file_id: &str) -> Result<AuditSnapshot, RemoteError> {
        let full = self.resolve(file_id);
        let meta = std::fs::metadata(&full).map_err(|e| io_error(&full, e))?;
        let log = meta
            .modified()
            .ok()
            .map(|t| format!("Last modified {}", rfc3339(t)))
            .unwrap_or_default();

        // Local files carry no author history; creation time comes from the
        // file listing.
        Ok(AuditSnapshot {
            log,
            ..AuditSnapshot::default()
        })
    }
}

fn sorted_entries(dir: &Path, dirs: bool) -> Result<Vec<String>, RemoteError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir() == dirs).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}

fn is_spreadsheet(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn io_error(path: &Path, e: std::io::Error) -> RemoteError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RemoteError::NotFound(path.display().to_string())
    } else {
        RemoteError::Request(format!("{}: {e}", path.display()))
    }
}
