//! # Formats
//!
//! Byte-level encodings of engine state. File I/O lives in the app layer.

pub mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_SIZE, Snapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use persistence::snapshot_fingerprint;
