//! Types shared between the scan pipeline and its callers

pub mod messages;

pub use messages::{ErrorCategory, ScanMessage};
