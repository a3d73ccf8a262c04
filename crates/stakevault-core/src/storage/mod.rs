//! # Storage
//!
//! Disk-backed persistence for sessions.

pub mod redb_store;

pub use redb_store::{JournalEntry, RedbStore};
