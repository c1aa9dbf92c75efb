//! Cache Store: persisted snapshots of extracted reviewer rows.
//!
//! One JSON document keyed by `category|application|reviewer`. Loaded
//! eagerly, mutated in memory during a scan, rewritten wholesale (temp file +
//! rename) only when something changed.

pub mod types;
pub mod store;

pub use types::*;
pub use store::{write_json_atomic, CacheStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
