//! # External Collaborator Ports
//!
//! The engine never talks to a staking protocol, a token program, or a clock
//! directly. Every external effect goes through one of the traits below.
//!
//! - [`StakingPools`]: stake oracle plus add-stake / unlock / withdraw
//! - [`DerivativeAsset`]: issuance and mint/burn of the derivative token
//! - [`BaseAsset`]: balances and transfers of the staked asset
//! - [`Clock`]: wall-clock seconds, used for pool selection and timestamps
//!
//! [`Host`] bundles all four; any type implementing them is a `Host`.
//!
//! ## Capabilities
//!
//! Calls that act *as the vault* take a capability value:
//! [`CustodyCapability`] for the custody principal, [`MintAuthority`] and
//! [`BurnAuthority`] for the derivative asset. Their constructors are private
//! to this crate, so implementors can inspect them but never forge one.

use crate::{AccountId, AssetId, Epoch, PoolId, StakeBreakdown, VaultError};
use serde::{Deserialize, Serialize};

// =============================================================================
// CAPABILITIES
// =============================================================================

/// The ability to act as the vault's controlling principal.
///
/// Owned by the vault configuration. Not `Clone`, not `Serialize`.
#[derive(Debug, PartialEq, Eq)]
pub struct CustodyCapability {
    principal: AccountId,
}

impl CustodyCapability {
    pub(crate) fn new(principal: AccountId) -> Self {
        Self { principal }
    }

    /// The account the vault acts as at external pools and assets.
    #[must_use]
    pub fn principal(&self) -> &AccountId {
        &self.principal
    }
}

/// Authority to mint the derivative asset.
#[derive(Debug, PartialEq, Eq)]
pub struct MintAuthority {
    asset: AssetId,
}

impl MintAuthority {
    pub(crate) fn new(asset: AssetId) -> Self {
        Self { asset }
    }

    #[must_use]
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }
}

/// Authority to burn the derivative asset.
#[derive(Debug, PartialEq, Eq)]
pub struct BurnAuthority {
    asset: AssetId,
}

impl BurnAuthority {
    pub(crate) fn new(asset: AssetId) -> Self {
        Self { asset }
    }

    #[must_use]
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }
}

/// Descriptive metadata for the derivative asset, supplied at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

// =============================================================================
// STAKING POOLS
// =============================================================================

/// The external staking protocol.
pub trait StakingPools {
    /// Whether `pool` is a valid staking destination.
    fn pool_exists(&self, pool: &PoolId) -> bool;

    /// Stake attributed to `principal` at `pool`.
    fn get_stake(&self, pool: &PoolId, principal: &AccountId)
    -> Result<StakeBreakdown, VaultError>;

    /// The pool's current observed lockup cycle.
    fn current_observed_epoch(&self, pool: &PoolId) -> Result<Epoch, VaultError>;

    /// Move `amount` of the custody principal's base asset into `pool` as active stake.
    fn add_stake(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError>;

    /// Move `amount` of active stake to pending-inactive.
    fn request_unlock(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError>;

    /// Move `amount` of inactive stake back to the custody principal's base balance.
    fn withdraw(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError>;
}

// =============================================================================
// DERIVATIVE ASSET
// =============================================================================

/// The derivative token program.
pub trait DerivativeAsset {
    /// Issue a new asset controlled by the custody principal.
    fn create_asset(
        &mut self,
        custody: &CustodyCapability,
        metadata: &AssetMetadata,
    ) -> Result<AssetId, VaultError>;

    fn mint(
        &mut self,
        authority: &MintAuthority,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError>;

    fn burn(
        &mut self,
        authority: &BurnAuthority,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError>;

    /// Circulating supply; `None` when the asset has never been minted.
    fn derivative_supply(&self, asset: &AssetId) -> Option<u64>;

    fn derivative_balance(&self, asset: &AssetId, account: &AccountId) -> u64;

    fn transfer_derivative(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError>;
}

// =============================================================================
// BASE ASSET
// =============================================================================

/// The staked base asset.
pub trait BaseAsset {
    fn base_balance(&self, account: &AccountId) -> u64;

    fn transfer_base(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError>;
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of wall-clock seconds.
///
/// Not a randomness source: pool selection samples it with a modulo.
pub trait Clock {
    fn now_seconds(&self) -> u64;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManualClock {
    now: u64,
}

impl ManualClock {
    #[must_use]
    pub const fn at(now: u64) -> Self {
        Self { now }
    }

    /// Advance by `seconds`, saturating.
    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    pub fn set(&mut self, now: u64) {
        self.now = now;
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> u64 {
        self.now
    }
}

// =============================================================================
// HOST
// =============================================================================

/// Everything the vault needs from the outside world.
pub trait Host: StakingPools + DerivativeAsset + BaseAsset + Clock {}

impl<T: StakingPools + DerivativeAsset + BaseAsset + Clock> Host for T {}

// =============================================================================
// TESTS
// =============================================================================
