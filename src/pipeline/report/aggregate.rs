use std::collections::BTreeMap;

use serde::Serialize;

use super::overrides::ManualOverrides;
use crate::models::{AppKey, AppStatus, AuditSnapshot, EntityKey, EntityState, RemoteFingerprint, ReviewRow};
use crate::pipeline::classify::OutcomeCounts;
use crate::pipeline::scan::EntityResult;

/// Rollup keyed by `"Category > Application"`.
pub type Aggregate = BTreeMap<String, AggregateNode>;

/// Computed status of one reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReviewerStatus {
    Completed,
    Pending { missing: u32 },
}

impl ReviewerStatus {
    pub fn from_counts(counts: &OutcomeCounts) -> Self {
        if counts.missing == 0 {
            Self::Completed
        } else {
            Self::Pending {
                missing: counts.missing,
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// `Completed` / `Pending`, as written in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Pending { .. } => "Pending",
        }
    }

    /// Display text, e.g. `Pending: 3`.
    pub fn text(&self) -> String {
        match self {
            Self::Completed => "Completed".to_string(),
            Self::Pending { missing } => format!("Pending: {missing}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerDetail {
    pub counts: OutcomeCounts,
    pub status: ReviewerStatus,
    pub status_text: String,
    pub folder_url: String,
    pub file_name: String,
    pub last_modified: String,
    pub created: Option<String>,
    pub creator: String,
    pub modifier: String,
    pub audit_log: String,
    /// Per-reviewer note from the overrides file.
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateNode {
    pub category: String,
    pub application: String,
    /// Reviewers with at least one row.
    pub total_users: u32,
    /// Reviewers with no missing response.
    pub completed_users: u32,
    pub reviewers: BTreeMap<String, ReviewerDetail>,
    pub manual_status: AppStatus,
    pub manual_note: String,
}

impl AggregateNode {
    fn new(app: &AppKey, overrides: &ManualOverrides) -> Self {
        let manual = overrides.get(app);
        Self {
            category: app.category.clone(),
            application: app.application.clone(),
            total_users: 0,
            completed_users: 0,
            reviewers: BTreeMap::new(),
            manual_status: manual.map(|o| o.app_status).unwrap_or_default(),
            manual_note: manual.map(|o| o.app_note.clone()).unwrap_or_default(),
        }
    }

    pub fn app_key(&self) -> AppKey {
        AppKey::new(&self.category, &self.application)
    }

    /// Whole-number completion percentage, rounded down. Zero when empty.
    pub fn completion_pct(&self) -> u32 {
        if self.total_users == 0 {
            return 0;
        }
        (u64::from(self.completed_users) * 100 / u64::from(self.total_users)) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.total_users > 0 && self.completed_users == self.total_users
    }

    /// Application status after the manual override is applied.
    pub fn effective_status(&self) -> &'static str {
        match self.manual_status {
            AppStatus::Calculated if self.is_complete() => "Completed",
            AppStatus::Calculated => "Pending",
            other => other.as_str(),
        }
    }

    /// Status written against one reviewer's rows in detail exports.
    pub fn final_status_for(&self, reviewer: &ReviewerStatus) -> &'static str {
        match self.manual_status {
            AppStatus::Calculated => reviewer.label(),
            other => other.as_str(),
        }
    }
}

/// Fold entity results into the per-application rollup.
///
/// Results without rows (skipped reviewers, empty sheets) are left out.
/// Input order does not matter; if a key appears twice, the result with more
/// rows wins, then a fresh read over a cached one, then the later fingerprint
/// and finally the row contents.
pub fn aggregate(results: &[EntityResult], overrides: &ManualOverrides) -> Aggregate {
    let mut unique: BTreeMap<&EntityKey, &EntityResult> = BTreeMap::new();
    for result in results.iter().filter(|r| r.has_rows()) {
        unique
            .entry(&result.key)
            .and_modify(|kept| {
                if preferred(result, kept) {
                    *kept = result;
                }
            })
            .or_insert(result);
    }

    let mut rollup = Aggregate::new();
    for (key, result) in unique {
        let app = key.app_key();
        let node = rollup
            .entry(app.label())
            .or_insert_with(|| AggregateNode::new(&app, overrides));

        let status = ReviewerStatus::from_counts(&result.counts);
        node.total_users += 1;
        if status.is_completed() {
            node.completed_users += 1;
        }

        let note = overrides
            .reviewer_note(&app, &key.reviewer)
            .unwrap_or_default()
            .to_string();

        node.reviewers.insert(
            key.reviewer.clone(),
            ReviewerDetail {
                counts: result.counts,
                status,
                status_text: status.text(),
                folder_url: result.folder_url.clone(),
                file_name: result.file_name.clone().unwrap_or_default(),
                last_modified: result
                    .fingerprint
                    .as_ref()
                    .map(|f| f.last_modified.clone())
                    .unwrap_or_default(),
                created: result.audit.created_ts.clone(),
                creator: result.audit.creator.clone(),
                modifier: result.audit.modifier.clone(),
                audit_log: result.audit.log.clone(),
                note,
            },
        );
    }

    rollup
}

/// Total order over results for one key; ties only between identical results.
fn preferred(candidate: &EntityResult, kept: &EntityResult) -> bool {
    rank(candidate) > rank(kept)
}

type Rank<'a> = (
    usize,
    bool,
    Option<&'a RemoteFingerprint>,
    &'a [ReviewRow],
    &'a AuditSnapshot,
    &'a str,
    Option<&'a str>,
);

fn rank(r: &EntityResult) -> Rank<'_> {
    (
        r.rows.len(),
        r.state == EntityState::Fresh,
        r.fingerprint.as_ref(),
        r.rows.as_slice(),
        &r.audit,
        r.folder_url.as_str(),
        r.file_name.as_deref(),
    )
}
