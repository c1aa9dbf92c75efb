//! Scan Coordinator
//!
//! Drives one batch run over every (category, application, reviewer) entity:
//! ```text
//! Discovery → Fingerprint → Hit (cached rows) | Fresh (download + extract) → Rollup
//! ```
//!
//! Each entity is processed in isolation on a bounded pool of blocking
//! workers. A failing entity becomes a `ScanError` and never stops the run.
//! Only the coordinator touches the `CacheStore`; it applies fresh entries one
//! at a time as workers finish and persists once at the end.

pub mod error;
pub mod types;
pub mod traits;
pub mod discovery;
pub mod local;
pub mod runner;

pub use error::{RemoteError, ScanError, ScanFailure};
pub use types::*;
pub use traits::RemoteStore;
pub use discovery::{pick_review_file, reviewer_entities};
pub use local::LocalFolderStore;
pub use runner::{process_entity, run_scan, ScanCoordinator};
