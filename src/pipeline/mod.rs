pub mod cache;
pub mod classify;
pub mod extraction;
pub mod report;
pub mod scan;
