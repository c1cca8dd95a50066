//! Audit log for the stockroom.
//!
//! Every ledger mutation leaves a [`Log`]. Logs are append-mostly: they disappear only
//! when reverted/solved/unsuppressed (always leaving a reciprocal log behind), when the
//! automatic stock-alert maintenance retires an alert, or when their entry is deleted.

pub mod alerts;
pub mod allocator;
pub mod audit_log;
pub mod log;

pub use allocator::LogIdAllocator;
pub use audit_log::{AuditLog, Revert};
pub use log::{Log, LogType, Severity};
