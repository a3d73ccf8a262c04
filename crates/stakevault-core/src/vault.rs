//! # Vault Operations
//!
//! The orchestrator. A [`Vault`] owns the configuration, the derivative
//! asset handles and the withdrawal ledger, and runs stake, unlock and
//! withdraw as sequences over them and the [`Host`].
//!
//! ## Atomicity
//!
//! Every operation validates and observes first, then performs external
//! calls, and mutates vault state last. Vault state is therefore untouched
//! by any failed operation. External effects are the host's to roll back;
//! [`crate::Session`] does so by staging the host.
//!
//! ## Withdrawal lifecycle
//!
//! `Requested -> Claimable -> Withdrawn (removed)`. There is no cancel.

use crate::exchange_rate::ExchangeRate;
use crate::ledger::WithdrawalLedger;
use crate::ports::{
    AssetMetadata, BurnAuthority, CustodyCapability, DerivativeAsset, Host, MintAuthority,
    StakingPools,
};
use crate::registry::PoolRegistry;
use crate::selector::{PoolSelector, UnlockPolicy};
use crate::{AccountId, AssetId, Epoch, PoolId, VaultError, Weight, WithdrawalEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STATE
// =============================================================================

/// The authoritative configuration record.
#[derive(Debug)]
pub struct VaultConfig {
    admin: AccountId,
    registry: PoolRegistry,
    custody: CustodyCapability,
    unlock_policy: UnlockPolicy,
}

/// Mint/burn authority and identity of the derivative asset.
#[derive(Debug)]
pub struct DerivativeAssetHandles {
    asset: AssetId,
    metadata: AssetMetadata,
    mint: MintAuthority,
    burn: BurnAuthority,
}

/// The vault handle. Created once by [`Vault::initialize`].
#[derive(Debug)]
pub struct Vault {
    config: VaultConfig,
    derivative: DerivativeAssetHandles,
    ledger: WithdrawalLedger,
}

/// Parameters for [`Vault::initialize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    /// Account allowed to change pools and the reward receipt.
    pub admin: AccountId,
    /// Principal the vault acts as at external pools.
    pub custody: AccountId,
    /// Initial reward receipt.
    pub reward_receipt: AccountId,
    /// Derivative asset metadata.
    pub metadata: AssetMetadata,
    #[serde(default)]
    pub unlock_policy: UnlockPolicy,
}

/// Plain-data form of a vault, for persistence.
///
/// Capabilities are rebuilt from the recorded addresses inside this crate
/// only. The sole public path from a record back to a live `Vault` is
/// [`crate::Session::from_bytes`] (or a redb resume), so persisted bytes are
/// trusted input: whoever can write them can name the admin and custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub admin: AccountId,
    pub custody: AccountId,
    pub registry: PoolRegistry,
    pub unlock_policy: UnlockPolicy,
    pub asset: AssetId,
    pub metadata: AssetMetadata,
    pub ledger: WithdrawalLedger,
}

// =============================================================================
// RECEIPTS
// =============================================================================

/// Result of a stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub pool: PoolId,
    pub base_amount: u64,
    pub derivative_amount: u64,
    /// Rate inputs observed before the deposit.
    pub rate: ExchangeRate,
}

/// Result of an unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockReceipt {
    pub entry: WithdrawalEntry,
    pub derivative_amount: u64,
    /// Rate inputs observed before the unlock.
    pub rate: ExchangeRate,
}

/// Result of a withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Released entries, newest first.
    pub released: Vec<WithdrawalEntry>,
    pub total_released: u64,
    /// Entries still waiting on their pool's epoch.
    pub remaining: usize,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Vault {
    /// Initialize the vault into `slot`.
    ///
    /// Only `deployer` may initialize, and only once. Issues the derivative
    /// asset under the custody principal.
    pub fn initialize<'a, H: Host + ?Sized>(
        slot: &'a mut Option<Vault>,
        deployer: &AccountId,
        caller: &AccountId,
        host: &mut H,
        params: InitParams,
    ) -> Result<&'a mut Vault, VaultError> {
        if caller != deployer {
            return Err(VaultError::Unauthorized);
        }
        if slot.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }

        let custody = CustodyCapability::new(params.custody);
        let asset = host.create_asset(&custody, &params.metadata)?;

        Ok(slot.insert(Self::assemble(
            params.admin,
            custody,
            PoolRegistry::new(params.reward_receipt),
            params.unlock_policy,
            asset,
            params.metadata,
            WithdrawalLedger::new(),
        )))
    }

    fn assemble(
        admin: AccountId,
        custody: CustodyCapability,
        registry: PoolRegistry,
        unlock_policy: UnlockPolicy,
        asset: AssetId,
        metadata: AssetMetadata,
        ledger: WithdrawalLedger,
    ) -> Self {
        Self {
            config: VaultConfig {
                admin,
                registry,
                custody,
                unlock_policy,
            },
            derivative: DerivativeAssetHandles {
                mint: MintAuthority::new(asset.clone()),
                burn: BurnAuthority::new(asset.clone()),
                asset,
                metadata,
            },
            ledger,
        }
    }

    /// Plain-data copy of the vault for persistence.
    #[must_use]
    pub fn to_record(&self) -> VaultRecord {
        VaultRecord {
            admin: self.config.admin.clone(),
            custody: self.config.custody.principal().clone(),
            registry: self.config.registry.clone(),
            unlock_policy: self.config.unlock_policy,
            asset: self.derivative.asset.clone(),
            metadata: self.derivative.metadata.clone(),
            ledger: self.ledger.clone(),
        }
    }

    pub(crate) fn from_record(record: VaultRecord) -> Self {
        Self::assemble(
            record.admin,
            CustodyCapability::new(record.custody),
            record.registry,
            record.unlock_policy,
            record.asset,
            record.metadata,
            record.ledger,
        )
    }

    fn require_admin(&self, caller: &AccountId) -> Result<(), VaultError> {
        if caller != &self.config.admin {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }
}

// =============================================================================
// ADMINISTRATION
// =============================================================================

impl Vault {
    /// Upsert a pool's weight. Administrator only.
    ///
    /// Weights may not all become zero while the vault holds active stake:
    /// such an update fails with `DivisionByZero` and nothing is written.
    /// Returns the previous weight, if any.
    pub fn set_pool_weight<P: StakingPools + ?Sized>(
        &mut self,
        pools: &P,
        caller: &AccountId,
        pool: PoolId,
        weight: Weight,
    ) -> Result<Option<Weight>, VaultError> {
        self.require_admin(caller)?;
        let exists = pools.pool_exists(&pool);
        if exists
            && weight.is_zero()
            && self.only_weight_left(&pool)
            && self.total_stake(pools)? > 0
        {
            return Err(VaultError::DivisionByZero);
        }
        self.config.registry.set_pool_weight(pool, weight, exists)
    }

    /// True when every pool other than `pool` already weighs zero.
    fn only_weight_left(&self, pool: &PoolId) -> bool {
        self.config
            .registry
            .pools()
            .all(|(id, weight)| id == pool || weight.is_zero())
    }

    /// Replace the reward receipt. Administrator only; must change the value.
    pub fn set_reward_receipt(
        &mut self,
        caller: &AccountId,
        receipt: AccountId,
    ) -> Result<(), VaultError> {
        self.require_admin(caller)?;
        self.config.registry.set_reward_receipt(receipt)
    }

    /// Change how unlock requests pick their pool. Administrator only.
    pub fn set_unlock_policy(
        &mut self,
        caller: &AccountId,
        policy: UnlockPolicy,
    ) -> Result<(), VaultError> {
        self.require_admin(caller)?;
        if policy == self.config.unlock_policy {
            return Err(VaultError::NoOpUpdate);
        }
        self.config.unlock_policy = policy;
        Ok(())
    }
}

// =============================================================================
// STAKE / UNLOCK / WITHDRAW
// =============================================================================

impl Vault {
    /// Deposit `amount` of base asset and mint derivative tokens to `caller`.
    ///
    /// The mint amount is computed against the rate observed before the
    /// deposit reaches the pool.
    pub fn stake<H: Host + ?Sized>(
        &self,
        host: &mut H,
        caller: &AccountId,
        amount: u64,
    ) -> Result<StakeReceipt, VaultError> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let pool = PoolSelector::choose(&self.config.registry, &*host)?;
        let rate = self.exchange_rate(&*host)?;
        let minted = rate.base_to_derivative(amount)?;
        if minted == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let available = host.base_balance(caller);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        let custody = &self.config.custody;
        host.transfer_base(caller, custody.principal(), amount)?;
        host.add_stake(custody, &pool, amount)?;
        host.mint(&self.derivative.mint, caller, minted)?;

        Ok(StakeReceipt {
            pool,
            base_amount: amount,
            derivative_amount: minted,
            rate,
        })
    }

    /// Burn `derivative_amount` of `caller`'s tokens and queue the base
    /// amount they redeem for withdrawal.
    pub fn unlock<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: &AccountId,
        derivative_amount: u64,
    ) -> Result<UnlockReceipt, VaultError> {
        if derivative_amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let held = host.derivative_balance(&self.derivative.asset, caller);
        if held < derivative_amount {
            return Err(VaultError::InsufficientBalance {
                needed: derivative_amount,
                available: held,
            });
        }

        let custody = &self.config.custody;
        let pool = PoolSelector::choose_for_unlock(
            &self.config.registry,
            &*host,
            custody.principal(),
            self.config.unlock_policy,
        )?;
        let rate = self.exchange_rate(&*host)?;
        let base_amount = rate.derivative_to_base(derivative_amount)?;
        if base_amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let unlock_epoch = host.current_observed_epoch(&pool)?;
        let init_time = host.now_seconds();

        host.request_unlock(custody, &pool, base_amount)?;
        host.burn(&self.derivative.burn, caller, derivative_amount)?;

        let entry = WithdrawalEntry::new(base_amount, pool, init_time, unlock_epoch);
        self.ledger.record_unlock(caller.clone(), entry.clone());

        Ok(UnlockReceipt {
            entry,
            derivative_amount,
            rate,
        })
    }

    /// Release every claimable withdrawal entry of `caller`.
    pub fn withdraw<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        caller: &AccountId,
    ) -> Result<WithdrawReceipt, VaultError> {
        let mut epochs: BTreeMap<PoolId, Epoch> = BTreeMap::new();
        for entry in self.ledger.pending(caller) {
            if !epochs.contains_key(&entry.pool) {
                let epoch = host.current_observed_epoch(&entry.pool)?;
                epochs.insert(entry.pool.clone(), epoch);
            }
        }

        let custody = &self.config.custody;
        let outcome = self.ledger.drain_claimable(
            caller,
            |pool| {
                epochs
                    .get(pool)
                    .copied()
                    .ok_or_else(|| VaultError::PoolNotRecognized(pool.clone()))
            },
            |entry| {
                host.withdraw(custody, &entry.pool, entry.amount)?;
                host.transfer_base(custody.principal(), caller, entry.amount)
            },
        )?;

        Ok(WithdrawReceipt {
            total_released: outcome.total_released()?,
            remaining: outcome.remaining,
            released: outcome.released,
        })
    }
}

// =============================================================================
// READS
// =============================================================================

impl Vault {
    /// Observe the current rate inputs.
    pub fn exchange_rate<H: StakingPools + DerivativeAsset + ?Sized>(
        &self,
        host: &H,
    ) -> Result<ExchangeRate, VaultError> {
        ExchangeRate::observe(
            &self.config.registry,
            host,
            self.config.custody.principal(),
            &self.derivative.asset,
        )
    }

    /// Derivative tokens a stake of `amount` would mint right now.
    pub fn preview_stake<H: StakingPools + DerivativeAsset + ?Sized>(
        &self,
        host: &H,
        amount: u64,
    ) -> Result<u64, VaultError> {
        self.exchange_rate(host)?.base_to_derivative(amount)
    }

    /// Base units an unlock of `derivative_amount` would queue right now.
    pub fn preview_unlock<H: StakingPools + DerivativeAsset + ?Sized>(
        &self,
        host: &H,
        derivative_amount: u64,
    ) -> Result<u64, VaultError> {
        self.exchange_rate(host)?
            .derivative_to_base(derivative_amount)
    }

    /// Active stake of the custody principal across all registered pools.
    pub fn total_stake<P: StakingPools + ?Sized>(&self, pools: &P) -> Result<u64, VaultError> {
        crate::exchange_rate::total_stake(
            &self.config.registry,
            pools,
            self.config.custody.principal(),
        )
    }

    /// Pending withdrawal entries for `account`, in request order.
    #[must_use]
    pub fn pending_withdrawals(&self, account: &AccountId) -> &[WithdrawalEntry] {
        self.ledger.pending(account)
    }

    #[must_use]
    pub fn pool_weight(&self, pool: &PoolId) -> Option<Weight> {
        self.config.registry.weight_of(pool)
    }

    pub fn total_weight(&self) -> Result<Weight, VaultError> {
        self.config.registry.total_weight()
    }

    /// `caller`'s derivative balance.
    pub fn derivative_balance<D: DerivativeAsset + ?Sized>(
        &self,
        assets: &D,
        account: &AccountId,
    ) -> u64 {
        assets.derivative_balance(&self.derivative.asset, account)
    }

    #[must_use]
    pub fn derivative_asset(&self) -> &AssetId {
        &self.derivative.asset
    }

    #[must_use]
    pub fn derivative_metadata(&self) -> &AssetMetadata {
        &self.derivative.metadata
    }

    #[must_use]
    pub fn admin(&self) -> &AccountId {
        &self.config.admin
    }

    #[must_use]
    pub fn custody_principal(&self) -> &AccountId {
        self.config.custody.principal()
    }

    #[must_use]
    pub fn reward_receipt(&self) -> &AccountId {
        self.config.registry.reward_receipt()
    }

    #[must_use]
    pub fn unlock_policy(&self) -> UnlockPolicy {
        self.config.unlock_policy
    }

    #[must_use]
    pub fn registry(&self) -> &PoolRegistry {
        &self.config.registry
    }

    #[must_use]
    pub fn ledger(&self) -> &WithdrawalLedger {
        &self.ledger
    }
}

// =============================================================================
// TESTS
// =============================================================================
