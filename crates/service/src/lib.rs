//! Application layer for the stockroom.
//!
//! [`Stockroom`] owns the ledger and the audit log behind one lock, records an audit log
//! for every mutation, keeps the stock alerts current, and announces changes on two
//! buses once the lock is released.

pub mod config;
pub mod error;
pub mod snapshot;
pub mod stockroom;

#[cfg(test)]
mod integration_tests;

pub use config::StockroomConfig;
pub use error::StockroomError;
pub use snapshot::Snapshot;
pub use stockroom::Stockroom;
