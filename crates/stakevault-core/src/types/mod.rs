//! # Core Type Definitions
//!
//! This module contains all core types for the stakevault accounting engine:
//! - Identifiers (`AccountId`, `PoolId`, `AssetId`)
//! - Numeric newtypes (`Weight`, `Epoch`)
//! - Stake observations (`StakeBreakdown`)
//! - Withdrawal records (`WithdrawalEntry`)
//! - Error types (`VaultError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use checked arithmetic where an overflow would corrupt accounting

use crate::primitives::MAX_ADDRESS_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Address of an account (participant, administrator, custody principal).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Create an account id, rejecting empty or oversized addresses.
    pub fn parse(s: impl Into<String>) -> Result<Self, VaultError> {
        let s = s.into();
        validate_address(&s)?;
        Ok(Self(s))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of an external staking pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl PoolId {
    /// Create a new pool id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Create a pool id, rejecting empty or oversized addresses.
    pub fn parse(s: impl Into<String>) -> Result<Self, VaultError> {
        let s = s.into();
        validate_address(&s)?;
        Ok(Self(s))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the derivative asset issued by the vault.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_address(s: &str) -> Result<(), VaultError> {
    if s.is_empty() || s.len() > MAX_ADDRESS_LENGTH || s.chars().any(char::is_whitespace) {
        return Err(VaultError::InvalidAddress(s.chars().take(32).collect()));
    }
    Ok(())
}

// =============================================================================
// NUMERIC NEWTYPES
// =============================================================================

/// Relative selection weight of a pool.
///
/// Weights are only meaningful relative to the registry total.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Weight(pub u128);

impl Weight {
    #[must_use]
    pub const fn new(weight: u128) -> Self {
        Self(weight)
    }

    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// A pool's observed lockup cycle counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Epoch(pub u64);

impl Epoch {
    #[must_use]
    pub const fn new(epoch: u64) -> Self {
        Self(epoch)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The following cycle, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

// =============================================================================
// STAKE OBSERVATION
// =============================================================================

/// Stake held by one principal at one pool, split by lifecycle state.
///
/// Only `active` stake counts toward the exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StakeBreakdown {
    /// Stake currently earning in the pool.
    pub active: u64,
    /// Stake requested for unlock, waiting for the lockup cycle to end.
    pub pending_inactive: u64,
    /// Stake whose lockup ended; withdrawable.
    pub inactive: u64,
}

impl StakeBreakdown {
    #[must_use]
    pub const fn new(active: u64, pending_inactive: u64, inactive: u64) -> Self {
        Self {
            active,
            pending_inactive,
            inactive,
        }
    }

    /// Sum of all three states, saturating.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.active
            .saturating_add(self.pending_inactive)
            .saturating_add(self.inactive)
    }
}

// =============================================================================
// WITHDRAWAL ENTRY
// =============================================================================

/// One pending unlock request.
///
/// Immutable once recorded; removed exactly once by a withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEntry {
    /// Base-asset units owed.
    pub amount: u64,
    /// Pool the stake is unlocking from.
    pub pool: PoolId,
    /// Wall-clock seconds at request time (informational).
    pub init_time: u64,
    /// The pool's observed epoch at request time.
    pub unlock_epoch: Epoch,
}

impl WithdrawalEntry {
    #[must_use]
    pub fn new(amount: u64, pool: PoolId, init_time: u64, unlock_epoch: Epoch) -> Self {
        Self {
            amount,
            pool,
            init_time,
            unlock_epoch,
        }
    }

    /// An entry is claimable once the pool's current epoch has moved past
    /// the epoch recorded at request time.
    #[must_use]
    pub fn is_claimable(&self, current: Epoch) -> bool {
        self.unlock_epoch < current
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the stakevault engine.
///
/// - Every failure aborts the whole operation with no partial state change
/// - Each variant carries a stable reason code (see [`VaultError::code`])
/// - The engine never retries; callers fix the condition and call again
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Caller lacks administrator rights.
    #[error("Caller is not authorized for this operation")]
    Unauthorized,

    /// The vault was already initialized.
    #[error("Vault is already initialized")]
    AlreadyInitialized,

    /// The vault has not been initialized yet.
    #[error("Vault is not initialized")]
    NotInitialized,

    /// Zero-amount stake/unlock, or an amount that converts to zero.
    #[error("Invalid amount")]
    InvalidAmount,

    /// Pool selection was requested with an empty registry.
    #[error("No pools configured")]
    NoPoolsConfigured,

    /// The external staking protocol does not know this pool.
    #[error("Pool not recognized: {0}")]
    PoolNotRecognized(PoolId),

    /// Total weight or derivative supply is zero where a divisor is required.
    #[error("Division by zero")]
    DivisionByZero,

    /// The update would leave the value unchanged.
    #[error("Update does not change the current value")]
    NoOpUpdate,

    /// Withdraw was called with nothing recorded for the caller.
    #[error("No pending withdrawals")]
    NoPendingWithdrawals,

    /// The caller does not hold enough of the asset being spent.
    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    /// An intermediate or final amount does not fit its integer type.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// An address is empty, too long, or contains whitespace.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// An external collaborator rejected the call.
    #[error("External call failed: {0}")]
    External(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl VaultError {
    /// Stable, machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::NoPoolsConfigured => "NO_POOLS_CONFIGURED",
            Self::PoolNotRecognized(_) => "POOL_NOT_RECOGNIZED",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::NoOpUpdate => "NO_OP_UPDATE",
            Self::NoPendingWithdrawals => "NO_PENDING_WITHDRAWALS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::External(_) => "EXTERNAL_FAILURE",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_claimable_only_after_epoch_advances() {
        let entry = WithdrawalEntry::new(10, PoolId::new("p1"), 0, Epoch::new(4));

        assert!(!entry.is_claimable(Epoch::new(3)));
        assert!(!entry.is_claimable(Epoch::new(4)));
        assert!(entry.is_claimable(Epoch::new(5)));
    }

    #[test]
    fn epoch_next_saturates() {
        assert_eq!(Epoch::new(u64::MAX).next(), Epoch::new(u64::MAX));
        assert_eq!(Epoch::new(1).next(), Epoch::new(2));
    }

    #[test]
    fn address_parsing_rejects_bad_input() {
        assert!(AccountId::parse("0xalice").is_ok());
        assert!(matches!(
            AccountId::parse(""),
            Err(VaultError::InvalidAddress(_))
        ));
        assert!(matches!(
            PoolId::parse("pool one"),
            Err(VaultError::InvalidAddress(_))
        ));
        assert!(PoolId::parse("x".repeat(MAX_ADDRESS_LENGTH + 1)).is_err());
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            VaultError::Unauthorized,
            VaultError::AlreadyInitialized,
            VaultError::NotInitialized,
            VaultError::InvalidAmount,
            VaultError::NoPoolsConfigured,
            VaultError::PoolNotRecognized(PoolId::new("p")),
            VaultError::DivisionByZero,
            VaultError::NoOpUpdate,
            VaultError::NoPendingWithdrawals,
            VaultError::InsufficientBalance {
                needed: 1,
                available: 0,
            },
            VaultError::ArithmeticOverflow,
            VaultError::InvalidAddress(String::new()),
            VaultError::External(String::new()),
            VaultError::SerializationError(String::new()),
            VaultError::IoError(String::new()),
        ];
        let codes: std::collections::BTreeSet<_> = errors.iter().map(VaultError::code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn stake_breakdown_total() {
        let stake = StakeBreakdown::new(5, 3, 2);
        assert_eq!(stake.total(), 10);
    }
}
