//! # Pool Registry
//!
//! The set of eligible destination pools, their relative weights, and the
//! address that receives protocol rewards.
//!
//! Pools are kept in a `BTreeMap`, so every iteration (selection, stake
//! summation, export) walks them in ascending `PoolId` order.
//!
//! Authorization is not checked here; the vault gates every mutation on the
//! administrator before calling into the registry.

use crate::{AccountId, PoolId, VaultError, Weight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configured pools and reward receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    /// Pool -> weight. Keys are unique; an upsert overwrites.
    pools: BTreeMap<PoolId, Weight>,
    /// Account receiving protocol yield.
    reward_receipt: AccountId,
}

impl PoolRegistry {
    /// Create an empty registry with the given reward receipt.
    #[must_use]
    pub fn new(reward_receipt: AccountId) -> Self {
        Self {
            pools: BTreeMap::new(),
            reward_receipt,
        }
    }

    /// Insert or overwrite the weight for `pool`.
    ///
    /// `pool_exists` is the external protocol's view of the pool; an unknown
    /// pool is rejected with `PoolNotRecognized` and nothing is written.
    /// Returns the previous weight, if any.
    pub fn set_pool_weight(
        &mut self,
        pool: PoolId,
        weight: Weight,
        pool_exists: bool,
    ) -> Result<Option<Weight>, VaultError> {
        if !pool_exists {
            return Err(VaultError::PoolNotRecognized(pool));
        }
        Ok(self.pools.insert(pool, weight))
    }

    /// Replace the reward receipt.
    ///
    /// Fails with `NoOpUpdate` when `receipt` equals the current value.
    pub fn set_reward_receipt(&mut self, receipt: AccountId) -> Result<(), VaultError> {
        if receipt == self.reward_receipt {
            return Err(VaultError::NoOpUpdate);
        }
        self.reward_receipt = receipt;
        Ok(())
    }

    /// Current reward receipt.
    #[must_use]
    pub fn reward_receipt(&self) -> &AccountId {
        &self.reward_receipt
    }

    /// Sum of all configured weights. Zero for an empty registry.
    pub fn total_weight(&self) -> Result<Weight, VaultError> {
        self.pools
            .values()
            .try_fold(0u128, |acc, w| acc.checked_add(w.value()))
            .map(Weight::new)
            .ok_or(VaultError::ArithmeticOverflow)
    }

    /// Weight configured for `pool`, if any.
    #[must_use]
    pub fn weight_of(&self, pool: &PoolId) -> Option<Weight> {
        self.pools.get(pool).copied()
    }

    /// Pools and weights in deterministic (ascending id) order.
    pub fn pools(&self) -> impl Iterator<Item = (&PoolId, Weight)> + '_ {
        self.pools.iter().map(|(id, w)| (id, *w))
    }

    /// Pool ids in deterministic order.
    pub fn pool_ids(&self) -> impl Iterator<Item = &PoolId> + '_ {
        self.pools.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
