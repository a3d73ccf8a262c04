//! # Simulated Network
//!
//! An in-process implementation of every port: staking pools with epochs,
//! a derivative token ledger, base-asset balances and a clock.
//!
//! Used by the service binary as its default host and by the test suites.
//! The whole network is plain data, so a session can clone it before an
//! operation and put the clone back if the operation fails.
//!
//! ## Pool model
//!
//! Each pool tracks a [`StakeBreakdown`] per principal and a current epoch.
//! `request_unlock` moves active stake to pending-inactive; advancing the
//! epoch moves all pending-inactive stake to inactive, where it can be
//! withdrawn.

use crate::ports::{
    AssetMetadata, BaseAsset, BurnAuthority, Clock, CustodyCapability, DerivativeAsset,
    ManualClock, MintAuthority, StakingPools, SystemClock,
};
use crate::{AccountId, AssetId, Epoch, PoolId, StakeBreakdown, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TYPES
// =============================================================================

/// Clock driving the simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChainClock {
    #[default]
    System,
    Manual(ManualClock),
}

/// A single simulated staking pool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct SimPool {
    epoch: Epoch,
    stakes: BTreeMap<AccountId, StakeBreakdown>,
}

/// Aggregate view of a pool across all principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub epoch: Epoch,
    pub stake: StakeBreakdown,
    pub principals: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SimAsset {
    metadata: AssetMetadata,
    controller: AccountId,
    supply: Option<u64>,
    balances: BTreeMap<AccountId, u64>,
}

/// The simulated host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulatedNetwork {
    pools: BTreeMap<PoolId, SimPool>,
    assets: BTreeMap<AssetId, SimAsset>,
    base: BTreeMap<AccountId, u64>,
    clock: ChainClock,
    issued: u64,
}

fn external(msg: impl Into<String>) -> VaultError {
    VaultError::External(msg.into())
}

// =============================================================================
// CONSTRUCTION AND CONTROL
// =============================================================================

impl SimulatedNetwork {
    /// A network driven by the operating system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A network whose clock starts at `now` and only moves on [`Self::tick`].
    #[must_use]
    pub fn with_manual_clock(now: u64) -> Self {
        Self {
            clock: ChainClock::Manual(ManualClock::at(now)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clock(&self) -> ChainClock {
        self.clock
    }

    /// Register a staking pool at epoch 0. Returns `false` if it already exists.
    pub fn register_pool(&mut self, pool: PoolId) -> bool {
        if self.pools.contains_key(&pool) {
            return false;
        }
        self.pools.insert(pool, SimPool::default());
        true
    }

    /// Registered pools in ascending id order.
    pub fn pool_ids(&self) -> impl Iterator<Item = &PoolId> {
        self.pools.keys()
    }

    /// Totals for `pool` summed over every principal.
    pub fn pool_summary(&self, pool: &PoolId) -> Result<PoolSummary, VaultError> {
        let sim = self.pool(pool)?;
        let mut stake = StakeBreakdown::default();
        for breakdown in sim.stakes.values() {
            stake.active = stake.active.saturating_add(breakdown.active);
            stake.pending_inactive = stake
                .pending_inactive
                .saturating_add(breakdown.pending_inactive);
            stake.inactive = stake.inactive.saturating_add(breakdown.inactive);
        }
        Ok(PoolSummary {
            epoch: sim.epoch,
            stake,
            principals: sim.stakes.len(),
        })
    }

    /// Credit `amount` of newly created base asset to `account`.
    pub fn fund(&mut self, account: &AccountId, amount: u64) -> Result<u64, VaultError> {
        let balance = self.base.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok(*balance)
    }

    /// End the pool's current epoch: pending-inactive stake becomes inactive.
    pub fn advance_epoch(&mut self, pool: &PoolId) -> Result<Epoch, VaultError> {
        let sim = self.pool_mut(pool)?;
        for breakdown in sim.stakes.values_mut() {
            breakdown.inactive = breakdown
                .inactive
                .checked_add(breakdown.pending_inactive)
                .ok_or(VaultError::ArithmeticOverflow)?;
            breakdown.pending_inactive = 0;
        }
        sim.epoch = sim.epoch.next();
        Ok(sim.epoch)
    }

    /// Add `amount` of rewards to the active stake of `pool`, split pro rata
    /// over its principals. Truncation dust is not credited.
    ///
    /// Returns the amount actually credited.
    pub fn distribute_rewards(&mut self, pool: &PoolId, amount: u64) -> Result<u64, VaultError> {
        let sim = self.pool_mut(pool)?;
        let total_active: u128 = sim.stakes.values().map(|s| u128::from(s.active)).sum();
        if total_active == 0 {
            return Err(external(format!("pool {} has no active stake", pool)));
        }

        let mut credited: u64 = 0;
        for breakdown in sim.stakes.values_mut() {
            let share = u128::from(breakdown.active) * u128::from(amount) / total_active;
            let share = u64::try_from(share).map_err(|_| VaultError::ArithmeticOverflow)?;
            breakdown.active = breakdown
                .active
                .checked_add(share)
                .ok_or(VaultError::ArithmeticOverflow)?;
            credited = credited
                .checked_add(share)
                .ok_or(VaultError::ArithmeticOverflow)?;
        }
        Ok(credited)
    }

    /// Advance a manual clock by `seconds`.
    pub fn tick(&mut self, seconds: u64) -> Result<u64, VaultError> {
        match &mut self.clock {
            ChainClock::Manual(clock) => {
                clock.advance(seconds);
                Ok(clock.now_seconds())
            }
            ChainClock::System => Err(external("system clock cannot be advanced")),
        }
    }

    /// Set a manual clock to `now`.
    pub fn set_time(&mut self, now: u64) -> Result<(), VaultError> {
        match &mut self.clock {
            ChainClock::Manual(clock) => {
                clock.set(now);
                Ok(())
            }
            ChainClock::System => Err(external("system clock cannot be set")),
        }
    }

    fn pool(&self, pool: &PoolId) -> Result<&SimPool, VaultError> {
        self.pools
            .get(pool)
            .ok_or_else(|| VaultError::PoolNotRecognized(pool.clone()))
    }

    fn pool_mut(&mut self, pool: &PoolId) -> Result<&mut SimPool, VaultError> {
        self.pools
            .get_mut(pool)
            .ok_or_else(|| VaultError::PoolNotRecognized(pool.clone()))
    }

    fn asset_mut(&mut self, asset: &AssetId) -> Result<&mut SimAsset, VaultError> {
        self.assets
            .get_mut(asset)
            .ok_or_else(|| external(format!("unknown asset {}", asset)))
    }

    fn debit_base(&mut self, account: &AccountId, amount: u64) -> Result<(), VaultError> {
        let available = self.base_balance(account);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.base.remove(account);
        } else {
            self.base.insert(account.clone(), remaining);
        }
        Ok(())
    }
}

// =============================================================================
// PORTS
// =============================================================================

impl StakingPools for SimulatedNetwork {
    fn pool_exists(&self, pool: &PoolId) -> bool {
        self.pools.contains_key(pool)
    }

    fn get_stake(
        &self,
        pool: &PoolId,
        principal: &AccountId,
    ) -> Result<StakeBreakdown, VaultError> {
        Ok(self
            .pool(pool)?
            .stakes
            .get(principal)
            .copied()
            .unwrap_or_default())
    }

    fn current_observed_epoch(&self, pool: &PoolId) -> Result<Epoch, VaultError> {
        Ok(self.pool(pool)?.epoch)
    }

    fn add_stake(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError> {
        self.pool(pool)?;
        self.debit_base(custody.principal(), amount)?;
        let breakdown = self
            .pool_mut(pool)?
            .stakes
            .entry(custody.principal().clone())
            .or_default();
        breakdown.active = breakdown
            .active
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok(())
    }

    fn request_unlock(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError> {
        let breakdown = staked_by(self.pool_mut(pool)?, pool, custody.principal())?;
        if breakdown.active < amount {
            return Err(external(format!(
                "pool {} holds {} active, unlock requested {}",
                pool, breakdown.active, amount
            )));
        }
        let pending = breakdown
            .pending_inactive
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        breakdown.active -= amount;
        breakdown.pending_inactive = pending;
        Ok(())
    }

    fn withdraw(
        &mut self,
        custody: &CustodyCapability,
        pool: &PoolId,
        amount: u64,
    ) -> Result<(), VaultError> {
        let breakdown = staked_by(self.pool_mut(pool)?, pool, custody.principal())?;
        if breakdown.inactive < amount {
            return Err(external(format!(
                "pool {} holds {} inactive, withdraw requested {}",
                pool, breakdown.inactive, amount
            )));
        }
        breakdown.inactive -= amount;
        self.fund(custody.principal(), amount)?;
        Ok(())
    }
}

/// The principal's stake in `sim`; a principal that never staked there is
/// an error rather than an implicit empty entry.
fn staked_by<'a>(
    sim: &'a mut SimPool,
    pool: &PoolId,
    principal: &AccountId,
) -> Result<&'a mut StakeBreakdown, VaultError> {
    sim.stakes
        .get_mut(principal)
        .ok_or_else(|| external(format!("{} has no stake in pool {}", principal, pool)))
}

impl DerivativeAsset for SimulatedNetwork {
    fn create_asset(
        &mut self,
        custody: &CustodyCapability,
        metadata: &AssetMetadata,
    ) -> Result<AssetId, VaultError> {
        self.issued = self
            .issued
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let id = AssetId(format!("{}:{}", metadata.symbol, self.issued));
        self.assets.insert(
            id.clone(),
            SimAsset {
                metadata: metadata.clone(),
                controller: custody.principal().clone(),
                supply: None,
                balances: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn mint(
        &mut self,
        authority: &MintAuthority,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError> {
        let asset = self.asset_mut(authority.asset())?;
        let supply = asset
            .supply
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let balance = asset.balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        asset.supply = Some(supply);
        Ok(())
    }

    fn burn(
        &mut self,
        authority: &BurnAuthority,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError> {
        let asset = self.asset_mut(authority.asset())?;
        let available = asset.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        asset.balances.insert(from.clone(), available - amount);
        asset.supply = Some(asset.supply.unwrap_or(0).saturating_sub(amount));
        Ok(())
    }

    fn derivative_supply(&self, asset: &AssetId) -> Option<u64> {
        self.assets.get(asset).and_then(|a| a.supply)
    }

    fn derivative_balance(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.assets
            .get(asset)
            .and_then(|a| a.balances.get(account).copied())
            .unwrap_or(0)
    }

    fn transfer_derivative(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError> {
        let asset = self.asset_mut(asset)?;
        let available = asset.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = asset
            .balances
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        asset.balances.insert(from.clone(), available - amount);
        asset.balances.insert(to.clone(), credited);
        Ok(())
    }
}

impl BaseAsset for SimulatedNetwork {
    fn base_balance(&self, account: &AccountId) -> u64 {
        self.base.get(account).copied().unwrap_or(0)
    }

    fn transfer_base(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), VaultError> {
        self.debit_base(from, amount)?;
        self.fund(to, amount)?;
        Ok(())
    }
}

impl Clock for SimulatedNetwork {
    fn now_seconds(&self) -> u64 {
        match self.clock {
            ChainClock::System => SystemClock.now_seconds(),
            ChainClock::Manual(clock) => clock.now_seconds(),
        }
    }
}

impl SimulatedNetwork {
    /// Controller principal of `asset`, if it exists.
    #[must_use]
    pub fn asset_controller(&self, asset: &AssetId) -> Option<&AccountId> {
        self.assets.get(asset).map(|a| &a.controller)
    }

    /// Metadata recorded when `asset` was issued.
    #[must_use]
    pub fn asset_metadata(&self, asset: &AssetId) -> Option<&AssetMetadata> {
        self.assets.get(asset).map(|a| &a.metadata)
    }
}

// =============================================================================
// TESTS
// =============================================================================
