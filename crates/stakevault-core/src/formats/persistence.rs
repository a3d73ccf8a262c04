//! # Snapshot Format
//!
//! Binary serialization of a full session: the vault record (if initialized)
//! and the simulated network.
//!
//! Format: Header (5 bytes) + postcard payload.
//! - 4 bytes: Magic ("SVLT")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded.
//! Encoding is deterministic: all maps are `BTreeMap`, so equal state yields
//! equal bytes.

use crate::sim::SimulatedNetwork;
use crate::vault::VaultRecord;
use crate::{VaultError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum accepted snapshot size in bytes.
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// HEADER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(VaultError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(VaultError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; primitives::HEADER_LEN] {
        let mut bytes = [0u8; primitives::HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() < primitives::HEADER_LEN {
            return Err(VaultError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Everything a session needs to resume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub vault: Option<VaultRecord>,
    pub network: SimulatedNetwork,
}

/// Encode a snapshot (header + payload).
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, VaultError> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| VaultError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(primitives::HEADER_LEN + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a snapshot, validating size and header first.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, VaultError> {
    if bytes.len() < primitives::HEADER_LEN {
        return Err(VaultError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            primitives::HEADER_LEN
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(VaultError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[primitives::HEADER_LEN..]).map_err(|e| {
        VaultError::SerializationError(format!("Failed to deserialize snapshot: {}", e))
    })
}

/// BLAKE3 fingerprint of the encoded snapshot, as hex.
///
/// Only available with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_fingerprint(snapshot: &Snapshot) -> Result<String, VaultError> {
    let bytes = snapshot_to_bytes(snapshot)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
