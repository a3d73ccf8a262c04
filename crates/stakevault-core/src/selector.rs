//! # Pool Selector
//!
//! Picks one destination pool per stake or unlock, proportionally to the
//! configured weights.
//!
//! Selection samples the clock: `r = now mod W`, then walks the pools in
//! registry order accumulating weights and returns the first pool whose
//! cumulative weight exceeds `r`. This is not randomness and is predictable
//! to anyone who knows the clock; it costs O(pools) and needs no oracle.
//!
//! Over many distinct clock samples the hit rate of each pool approaches its
//! share of the total weight.

use crate::ports::{Clock, StakingPools};
use crate::registry::PoolRegistry;
use crate::{AccountId, PoolId, VaultError};
use serde::{Deserialize, Serialize};

/// How the pool for an unlock request is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// Same weighted draw as stake; ignores where the stake actually sits.
    #[default]
    Weighted,
    /// The registered pool where the custody principal holds the most active stake.
    LargestActive,
}

impl std::str::FromStr for UnlockPolicy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted" => Ok(Self::Weighted),
            "largest_active" | "largest-active" => Ok(Self::LargestActive),
            other => Err(VaultError::SerializationError(format!(
                "Unknown unlock policy: {}",
                other
            ))),
        }
    }
}

/// Weighted pool selection.
pub struct PoolSelector;

impl PoolSelector {
    /// Choose a pool using the clock as the sample source.
    pub fn choose<C: Clock + ?Sized>(
        registry: &PoolRegistry,
        clock: &C,
    ) -> Result<PoolId, VaultError> {
        Self::choose_at(registry, clock.now_seconds())
    }

    /// Choose a pool for an explicit sample value.
    pub fn choose_at(registry: &PoolRegistry, sample: u64) -> Result<PoolId, VaultError> {
        if registry.is_empty() {
            return Err(VaultError::NoPoolsConfigured);
        }
        let total = registry.total_weight()?.value();
        if total == 0 {
            return Err(VaultError::DivisionByZero);
        }

        let r = u128::from(sample) % total;
        let mut cumulative: u128 = 0;
        for (pool, weight) in registry.pools() {
            // Cannot overflow: the running sum never exceeds `total`.
            cumulative += weight.value();
            if cumulative > r {
                return Ok(pool.clone());
            }
        }

        // Unreachable given r < total; fall back to the first pool.
        registry
            .pool_ids()
            .next()
            .cloned()
            .ok_or(VaultError::NoPoolsConfigured)
    }

    /// Choose the pool to unlock from according to `policy`.
    pub fn choose_for_unlock<H: StakingPools + Clock + ?Sized>(
        registry: &PoolRegistry,
        host: &H,
        principal: &AccountId,
        policy: UnlockPolicy,
    ) -> Result<PoolId, VaultError> {
        match policy {
            UnlockPolicy::Weighted => Self::choose(registry, host),
            UnlockPolicy::LargestActive => {
                if registry.is_empty() {
                    return Err(VaultError::NoPoolsConfigured);
                }
                let mut best: Option<(&PoolId, u64)> = None;
                for pool in registry.pool_ids() {
                    let active = host.get_stake(pool, principal)?.active;
                    // Strictly greater keeps the first pool on ties.
                    if best.is_none_or(|(_, top)| active > top) {
                        best = Some((pool, active));
                    }
                }
                best.map(|(pool, _)| pool.clone())
                    .ok_or(VaultError::NoPoolsConfigured)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use crate::{AccountId, Weight};

    fn registry(pools: &[(&str, u128)]) -> PoolRegistry {
        let mut reg = PoolRegistry::new(AccountId::new("0xtreasury"));
        for (id, w) in pools {
            reg.set_pool_weight(PoolId::new(*id), Weight::new(*w), true)
                .expect("insert");
        }
        reg
    }

    #[test]
    fn empty_registry_fails() {
        let reg = registry(&[]);
        assert_eq!(
            PoolSelector::choose(&reg, &ManualClock::at(7)),
            Err(VaultError::NoPoolsConfigured)
        );
    }

    #[test]
    fn zero_total_weight_fails() {
        let reg = registry(&[("a", 0), ("b", 0)]);
        assert_eq!(
            PoolSelector::choose(&reg, &ManualClock::at(7)),
            Err(VaultError::DivisionByZero)
        );
    }

    #[test]
    fn cumulative_boundaries() {
        // a covers [0, 1), b covers [1, 3)
        let reg = registry(&[("a", 1), ("b", 2)]);

        assert_eq!(PoolSelector::choose_at(&reg, 0).expect("0").as_str(), "a");
        assert_eq!(PoolSelector::choose_at(&reg, 1).expect("1").as_str(), "b");
        assert_eq!(PoolSelector::choose_at(&reg, 2).expect("2").as_str(), "b");
        assert_eq!(PoolSelector::choose_at(&reg, 3).expect("3").as_str(), "a");
    }

    #[test]
    fn zero_weight_pool_never_chosen() {
        let reg = registry(&[("a", 0), ("b", 5)]);
        for t in 0..50 {
            assert_eq!(PoolSelector::choose_at(&reg, t).expect("pick").as_str(), "b");
        }
    }

    #[test]
    fn same_sample_same_pool() {
        let reg = registry(&[("a", 3), ("b", 4), ("c", 5)]);
        let clock = ManualClock::at(1_700_000_123);
        let first = PoolSelector::choose(&reg, &clock).expect("first");
        let second = PoolSelector::choose(&reg, &clock).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn unlock_policy_parses() {
        assert_eq!(
            "weighted".parse::<UnlockPolicy>().expect("parse"),
            UnlockPolicy::Weighted
        );
        assert_eq!(
            "largest-active".parse::<UnlockPolicy>().expect("parse"),
            UnlockPolicy::LargestActive
        );
        assert!("random".parse::<UnlockPolicy>().is_err());
    }
}
