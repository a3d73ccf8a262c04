//! # Engine Primitives
//!
//! Hardcoded runtime constants for the stakevault engine.
//!
//! These are compiled into the binary and immutable at runtime.

/// Magic bytes for the stakevault snapshot header.
///
/// - File Header = Magic Bytes ("SVLT") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"SVLT";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the snapshot header in bytes.
pub const HEADER_LEN: usize = 5;

/// Maximum length for account, pool and asset addresses.
///
/// Longer addresses are rejected at parse time.
pub const MAX_ADDRESS_LENGTH: usize = 128;

/// Maximum number of withdrawal entries returned by a single pending query.
///
/// The ledger itself is unbounded; this only caps read responses.
pub const MAX_PENDING_PAGE: usize = 1000;

/// Default number of decimals for the derivative asset.
pub const DEFAULT_DERIVATIVE_DECIMALS: u8 = 8;
