//! # stakevault-core
//!
//! The deterministic accounting engine for a liquid-staking vault.
//!
//! Users deposit a base asset, the vault spreads it over weighted external
//! staking pools, and depositors receive a derivative token whose rate
//! floats with the stake the vault controls. Unlocks queue per-account
//! withdrawal entries that mature when the pool's epoch moves on.
//!
//! ## Architectural Constraints
//!
//! - Integer arithmetic only, `u128` intermediates, truncating division
//! - Every external effect goes through the traits in [`ports`]
//! - `BTreeMap` everywhere: iteration order and encodings are deterministic
//! - NO async, NO network dependencies, NO logging (the app layer logs receipts)

// =============================================================================
// MODULES
// =============================================================================

pub mod exchange_rate;
pub mod formats;
pub mod ledger;
pub mod ports;
pub mod primitives;
pub mod registry;
pub mod selector;
pub mod session;
pub mod sim;
pub mod storage;
pub mod types;
pub mod vault;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    AccountId, AssetId, Epoch, PoolId, StakeBreakdown, VaultError, Weight, WithdrawalEntry,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use exchange_rate::{ExchangeRate, mul_div};
pub use ledger::{DrainOutcome, WithdrawalLedger};
pub use ports::{
    AssetMetadata, BaseAsset, BurnAuthority, Clock, CustodyCapability, DerivativeAsset, Host,
    ManualClock, MintAuthority, StakingPools, SystemClock,
};
pub use registry::PoolRegistry;
pub use selector::{PoolSelector, UnlockPolicy};
pub use session::{Session, StorageBackend};
pub use sim::{ChainClock, PoolSummary, SimulatedNetwork};
pub use storage::{JournalEntry, RedbStore};
pub use vault::{
    InitParams, StakeReceipt, UnlockReceipt, Vault, VaultRecord, WithdrawReceipt,
};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

#[cfg(feature = "crypto-hash")]
pub use formats::snapshot_fingerprint;
pub use formats::{Snapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
