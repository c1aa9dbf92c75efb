//! Response Classifier: maps free-text reviewer responses to outcome flags.
//!
//! Keyword membership only: the lower-cased, trimmed response is checked for
//! each keyword as a substring. A response may match several lists ("keep but
//! update title" is both approved and changed), so flags are independent.
//! There is no failure mode; unrecognised text yields all-false.

use serde::{Deserialize, Serialize};

use crate::models::ReviewRow;

const APPROVE_KEYWORDS: &[&str] = &["approv", "retain", "keep", "confirm", "yes", "ok", "active"];
const DENY_KEYWORDS: &[&str] = &["denied", "deny", "remove", "delete", "revok", "reject", "no"];
const CHANGE_KEYWORDS: &[&str] = &["change", "modif", "updat", "correct", "edit", "adjust"];

/// Outcome flags derived from one response. Never persisted as authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeFlags {
    pub approved: bool,
    pub denied: bool,
    pub changed: bool,
}

impl OutcomeFlags {
    pub fn is_empty(&self) -> bool {
        !(self.approved || self.denied || self.changed)
    }
}

/// Classify a response string.
pub fn classify(response: &str) -> OutcomeFlags {
    let text = response.trim().to_lowercase();
    if text.is_empty() {
        return OutcomeFlags::default();
    }

    OutcomeFlags {
        approved: contains_any(&text, APPROVE_KEYWORDS),
        denied: contains_any(&text, DENY_KEYWORDS),
        changed: contains_any(&text, CHANGE_KEYWORDS),
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

// ═══════════════════════════════════════════
// Counts
// ═══════════════════════════════════════════

/// Flag sums plus missing responses over a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub approved: u32,
    pub denied: u32,
    pub changed: u32,
    pub missing: u32,
}

impl OutcomeCounts {
    /// Classify every row afresh. `is_missing` is re-derived from the
    /// response rather than trusted from the row.
    pub fn from_rows(rows: &[ReviewRow]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            acc.add(classify(&row.response), ReviewRow::response_missing(&row.response));
            acc
        })
    }

    pub fn add(&mut self, flags: OutcomeFlags, missing: bool) {
        self.approved += u32::from(flags.approved);
        self.denied += u32::from(flags.denied);
        self.changed += u32::from(flags.changed);
        self.missing += u32::from(missing);
    }

    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }
}
