//! # Exchange Rate
//!
//! Conversion between base-asset amounts and derivative-token amounts.
//!
//! The derivative token is a floating-rate claim: `supply / total_stake`
//! defines the rate, and minting or burning at the current rate keeps every
//! holder's share proportional regardless of yield accrued since deposit.
//!
//! ## Numeric Contract
//!
//! - Multiply-before-divide in `u128`, operands are `u64`
//! - Truncating division: rounding always favors the vault
//! - Results that do not fit back into `u64` fail with `ArithmeticOverflow`
//!
//! ## Observation
//!
//! [`ExchangeRate::observe`] reads total active stake and supply once. An
//! operation takes its snapshot before any mutation and converts against it.

use crate::ports::{DerivativeAsset, StakingPools};
use crate::registry::PoolRegistry;
use crate::{AccountId, AssetId, VaultError};
use serde::{Deserialize, Serialize};

/// `a * b / c` with a double-width intermediate.
pub fn mul_div(a: u64, b: u64, c: u64) -> Result<u64, VaultError> {
    if c == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let wide = u128::from(a) * u128::from(b) / u128::from(c);
    u64::try_from(wide).map_err(|_| VaultError::ArithmeticOverflow)
}

/// Sum of the custody principal's *active* stake across every registered pool.
///
/// Pending-inactive and inactive stake are leaving the pools and are not part
/// of the rate denominator.
pub fn total_stake<P: StakingPools + ?Sized>(
    registry: &PoolRegistry,
    pools: &P,
    principal: &AccountId,
) -> Result<u64, VaultError> {
    let mut total: u64 = 0;
    for pool in registry.pool_ids() {
        let stake = pools.get_stake(pool, principal)?;
        total = total
            .checked_add(stake.active)
            .ok_or(VaultError::ArithmeticOverflow)?;
    }
    Ok(total)
}

/// A point-in-time view of the vault's rate inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Active stake held by the custody principal across all pools.
    pub total_stake: u64,
    /// Derivative supply; `None` before the first mint.
    pub derivative_supply: Option<u64>,
}

impl ExchangeRate {
    #[must_use]
    pub const fn new(total_stake: u64, derivative_supply: Option<u64>) -> Self {
        Self {
            total_stake,
            derivative_supply,
        }
    }

    /// Read both rate inputs from the host.
    pub fn observe<H: StakingPools + DerivativeAsset + ?Sized>(
        registry: &PoolRegistry,
        host: &H,
        principal: &AccountId,
        asset: &AssetId,
    ) -> Result<Self, VaultError> {
        let total_stake = total_stake(registry, host, principal)?;
        let derivative_supply = host.derivative_supply(asset);
        Ok(Self::new(total_stake, derivative_supply))
    }

    /// Derivative supply, treating "never minted" as zero.
    #[must_use]
    pub fn supply(&self) -> u64 {
        self.derivative_supply.unwrap_or(0)
    }

    /// Whether conversions are at the 1:1 bootstrap rate.
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        self.supply() == 0 || self.total_stake == 0
    }

    /// Derivative tokens minted for `base_amount`.
    ///
    /// With no supply or no stake the first depositor sets the baseline and
    /// receives `base_amount` unchanged.
    pub fn base_to_derivative(&self, base_amount: u64) -> Result<u64, VaultError> {
        if self.is_bootstrap() {
            return Ok(base_amount);
        }
        mul_div(self.supply(), base_amount, self.total_stake)
    }

    /// Base units owed for burning `derivative_amount`.
    ///
    /// No bootstrap fallback: redeeming with zero supply is a division by zero.
    pub fn derivative_to_base(&self, derivative_amount: u64) -> Result<u64, VaultError> {
        mul_div(self.total_stake, derivative_amount, self.supply())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_one_to_one() {
        let undefined = ExchangeRate::new(0, None);
        assert_eq!(undefined.base_to_derivative(1_000).expect("mint"), 1_000);

        let zero_stake = ExchangeRate::new(0, Some(500));
        assert_eq!(zero_stake.base_to_derivative(42).expect("mint"), 42);

        let zero_supply = ExchangeRate::new(700, Some(0));
        assert_eq!(zero_supply.base_to_derivative(9).expect("mint"), 9);
    }

    #[test]
    fn redeem_without_supply_is_division_by_zero() {
        assert_eq!(
            ExchangeRate::new(100, None).derivative_to_base(1),
            Err(VaultError::DivisionByZero)
        );
        assert_eq!(
            ExchangeRate::new(100, Some(0)).derivative_to_base(1),
            Err(VaultError::DivisionByZero)
        );
    }

    #[test]
    fn yield_raises_redemption_value() {
        // 1000 tokens backed by 1100 stake after 10% yield.
        let rate = ExchangeRate::new(1_100, Some(1_000));

        assert_eq!(rate.derivative_to_base(100).expect("redeem"), 110);
        assert_eq!(rate.base_to_derivative(110).expect("mint"), 100);
    }

    #[test]
    fn truncation_favors_vault() {
        let rate = ExchangeRate::new(3, Some(2));

        // 2 * 1 / 3 = 0.66 -> 0
        assert_eq!(rate.base_to_derivative(1).expect("mint"), 0);
        // 3 * 1 / 2 = 1.5 -> 1
        assert_eq!(rate.derivative_to_base(1).expect("redeem"), 1);
    }

    #[test]
    fn wide_intermediate_avoids_overflow() {
        let rate = ExchangeRate::new(u64::MAX, Some(u64::MAX));
        assert_eq!(
            rate.base_to_derivative(u64::MAX).expect("mint"),
            u64::MAX
        );
    }

    #[test]
    fn oversized_result_reports_overflow() {
        assert_eq!(mul_div(u64::MAX, 2, 1), Err(VaultError::ArithmeticOverflow));
    }
}
