//! Discovery: expands application folders into reviewer entities and picks
//! the review file inside a reviewer folder.

use std::collections::HashSet;

use super::types::{EntityTarget, RemoteFile, RemoteFolder, ScanTarget};
use crate::config::ScanConfig;
use crate::models::EntityKey;

/// Reviewer entities under one application, excluding housekeeping folders.
/// Duplicate folder names collapse to the first occurrence.
pub fn reviewer_entities(
    target: &ScanTarget,
    folders: Vec<RemoteFolder>,
    config: &ScanConfig,
) -> Vec<EntityTarget> {
    let base = target.path.trim_end_matches('/');
    let mut seen = HashSet::new();

    folders
        .into_iter()
        .filter(|f| !f.name.trim().is_empty() && !config.is_excluded_folder(&f.name))
        .filter(|f| seen.insert(f.name.clone()))
        .map(|f| EntityTarget {
            key: EntityKey::new(&target.category, &target.application, &f.name),
            folder_path: format!("{base}/{}", f.name),
            folder_url: f.web_url,
        })
        .collect()
}

/// The reviewer's own file when its name mentions the reviewer
/// (case-insensitive), otherwise the first file listed.
pub fn pick_review_file<'a>(files: &'a [RemoteFile], reviewer: &str) -> Option<&'a RemoteFile> {
    let needle = reviewer.trim().to_lowercase();
    files
        .iter()
        .find(|f| !needle.is_empty() && f.name.to_lowercase().contains(&needle))
        .or_else(|| files.first())
}
