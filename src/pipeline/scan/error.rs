//! Scan error types.
//!
//! `ScanFailure` is what went wrong inside one unit of work; `ScanError` is
//! the serializable record the coordinator keeps for the report.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{EntityTarget, ScanTarget};
use crate::models::{EntityKey, ScanErrorKind};
use crate::pipeline::extraction::ParseError;

/// Failure reported by a `RemoteStore` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Remote request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum ScanFailure {
    #[error("Listing failed: {0}")]
    Discovery(RemoteError),

    #[error("Download failed: {0}")]
    Download(RemoteError),

    #[error("Audit lookup failed: {0}")]
    Audit(RemoteError),

    #[error("Spreadsheet not usable: {0}")]
    Parse(#[from] ParseError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl ScanFailure {
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            Self::Discovery(_) => ScanErrorKind::Discovery,
            Self::Download(_) => ScanErrorKind::Download,
            Self::Audit(_) => ScanErrorKind::Audit,
            Self::Parse(_) => ScanErrorKind::Parse,
            Self::Timeout(_) => ScanErrorKind::Timeout,
            Self::Worker(_) => ScanErrorKind::Worker,
        }
    }
}

/// One recorded failure. `reviewer` is `None` when a whole application
/// could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub category: String,
    pub application: String,
    pub reviewer: Option<String>,
    pub folder_url: Option<String>,
    pub kind: ScanErrorKind,
    pub message: String,
}

impl ScanError {
    pub fn for_entity(target: &EntityTarget, failure: &ScanFailure) -> Self {
        Self {
            category: target.key.category.clone(),
            application: target.key.application.clone(),
            reviewer: Some(target.key.reviewer.clone()),
            folder_url: Some(target.folder_url.clone()),
            kind: failure.kind(),
            message: failure.to_string(),
        }
    }

    pub fn for_application(target: &ScanTarget, failure: &ScanFailure) -> Self {
        Self {
            category: target.category.clone(),
            application: target.application.clone(),
            reviewer: None,
            folder_url: None,
            kind: failure.kind(),
            message: failure.to_string(),
        }
    }

    /// Entity this error belongs to, if it is entity-level.
    pub fn entity_key(&self) -> Option<EntityKey> {
        self.reviewer
            .as_ref()
            .map(|r| EntityKey::new(&self.category, &self.application, r))
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reviewer {
            Some(r) => write!(f, "{} > {} > {}: {}", self.category, self.application, r, self.message),
            None => write!(f, "{} > {}: {}", self.category, self.application, self.message),
        }
    }
}
