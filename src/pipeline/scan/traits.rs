//! Remote document store boundary.
//!
//! Authentication, paging and HTTP live in the implementation; the scan only
//! sees folders, files and bytes. Calls are blocking and run on the
//! coordinator's worker pool.

use super::error::RemoteError;
use super::types::{RemoteFile, RemoteFolder};
use crate::models::AuditSnapshot;

pub trait RemoteStore: Send + Sync {
    /// Sub-folders of an application folder (one per reviewer).
    fn list_reviewer_folders(&self, path: &str) -> Result<Vec<RemoteFolder>, RemoteError>;

    /// Spreadsheet files directly inside a reviewer folder.
    fn list_spreadsheet_files(&self, path: &str) -> Result<Vec<RemoteFile>, RemoteError>;

    /// Raw bytes of the file at `path`.
    fn download_file(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Creation/modification provenance for a file.
    fn audit_snapshot(&self, file_id: &str) -> Result<AuditSnapshot, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_store_is_object_safe() {
        fn _assert_store(_: &dyn RemoteStore) {}
    }
}
