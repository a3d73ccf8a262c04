//! # Session Module
//!
//! A session owns the vault slot, the simulated network it runs against and
//! the storage backend, and makes every mutating operation all-or-nothing.
//!
//! ## Commit protocol
//!
//! 1. Snapshot vault record and network
//! 2. Run the operation
//! 3. Persist (persistent backend only)
//! 4. On any error in 2 or 3, restore the snapshot
//!
//! ## Storage Backends
//!
//! - `InMemory`: state lives only in the session
//! - `Persistent`: every commit is written to a [`RedbStore`]

use crate::formats::{Snapshot, snapshot_from_bytes, snapshot_to_bytes};
use crate::ports::{BaseAsset, Clock};
use crate::selector::UnlockPolicy;
use crate::sim::{PoolSummary, SimulatedNetwork};
use crate::storage::{JournalEntry, RedbStore};
use crate::vault::{InitParams, StakeReceipt, UnlockReceipt, Vault, WithdrawReceipt};
use crate::{AccountId, Epoch, ExchangeRate, PoolId, VaultError, Weight, WithdrawalEntry};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug, Default)]
pub enum StorageBackend {
    /// Volatile; lost when the session is dropped unless exported.
    #[default]
    InMemory,
    /// Disk-backed using redb.
    Persistent(RedbStore),
}

/// A vault, its host and where they are stored.
///
/// Note: Session does NOT implement Clone. The vault holds capabilities and
/// the persistent backend holds a database handle.
#[derive(Debug)]
pub struct Session {
    deployer: AccountId,
    vault: Option<Vault>,
    network: SimulatedNetwork,
    backend: StorageBackend,
}

fn require(slot: &mut Option<Vault>) -> Result<&mut Vault, VaultError> {
    slot.as_mut().ok_or(VaultError::NotInitialized)
}

impl Session {
    /// In-memory session over `network`, initializable only by `deployer`.
    #[must_use]
    pub fn new(deployer: AccountId, network: SimulatedNetwork) -> Self {
        Self {
            deployer,
            vault: None,
            network,
            backend: StorageBackend::InMemory,
        }
    }

    /// In-memory session resumed from exported snapshot bytes.
    pub fn from_bytes(deployer: AccountId, bytes: &[u8]) -> Result<Self, VaultError> {
        Ok(Self::from_snapshot(deployer, snapshot_from_bytes(bytes)?))
    }

    fn from_snapshot(deployer: AccountId, snapshot: Snapshot) -> Self {
        Self {
            deployer,
            vault: snapshot.vault.map(Vault::from_record),
            network: snapshot.network,
            backend: StorageBackend::InMemory,
        }
    }

    /// Session backed by a redb database at `path`.
    ///
    /// Resumes the stored snapshot if there is one; otherwise starts from
    /// `seed` with no vault.
    pub fn with_redb(
        path: impl AsRef<Path>,
        deployer: AccountId,
        seed: SimulatedNetwork,
    ) -> Result<Self, VaultError> {
        let store = RedbStore::open(path)?;
        let mut session = match store.load()? {
            Some(bytes) => Self::from_bytes(deployer, &bytes)?,
            None => Self::new(deployer, seed),
        };
        session.backend = StorageBackend::Persistent(store);
        Ok(session)
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn deployer(&self) -> &AccountId {
        &self.deployer
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.vault.is_some()
    }

    /// The vault, or `NotInitialized`.
    pub fn vault(&self) -> Result<&Vault, VaultError> {
        self.vault.as_ref().ok_or(VaultError::NotInitialized)
    }

    #[must_use]
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Plain-data copy of the whole session state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            vault: self.vault.as_ref().map(Vault::to_record),
            network: self.network.clone(),
        }
    }

    /// Encoded snapshot (header + payload).
    pub fn export_bytes(&self) -> Result<Vec<u8>, VaultError> {
        snapshot_to_bytes(&self.snapshot())
    }

    /// BLAKE3 fingerprint of the encoded snapshot.
    #[cfg(feature = "crypto-hash")]
    pub fn fingerprint(&self) -> Result<String, VaultError> {
        crate::formats::snapshot_fingerprint(&self.snapshot())
    }

    /// Revision of the persistent store; `None` for in-memory sessions.
    #[must_use]
    pub fn revision(&self) -> Option<u64> {
        match &self.backend {
            StorageBackend::InMemory => None,
            StorageBackend::Persistent(store) => Some(store.revision()),
        }
    }

    /// Most recent journal entries; empty for in-memory sessions.
    pub fn journal(&self, limit: usize) -> Result<Vec<JournalEntry>, VaultError> {
        match &self.backend {
            StorageBackend::InMemory => Ok(Vec::new()),
            StorageBackend::Persistent(store) => store.journal(limit),
        }
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    fn commit<T, F>(&mut self, operation: &str, op: F) -> Result<T, VaultError>
    where
        F: FnOnce(&AccountId, &mut Option<Vault>, &mut SimulatedNetwork) -> Result<T, VaultError>,
    {
        let prior = self.snapshot();
        let result = op(&self.deployer, &mut self.vault, &mut self.network)
            .and_then(|value| self.persist(operation).map(|()| value));
        if result.is_err() {
            self.vault = prior.vault.map(Vault::from_record);
            self.network = prior.network;
        }
        result
    }

    fn persist(&mut self, operation: &str) -> Result<(), VaultError> {
        if let StorageBackend::Persistent(store) = &mut self.backend {
            let bytes = snapshot_to_bytes(&Snapshot {
                vault: self.vault.as_ref().map(Vault::to_record),
                network: self.network.clone(),
            })?;
            store.save(&bytes, operation)?;
        }
        Ok(())
    }

    // =========================================================================
    // VAULT OPERATIONS
    // =========================================================================

    /// Create the vault. Deployer only, once.
    pub fn initialize(&mut self, caller: &AccountId, params: InitParams) -> Result<(), VaultError> {
        self.commit("initialize", |deployer, slot, net| {
            Vault::initialize(slot, deployer, caller, net, params).map(|_| ())
        })
    }

    pub fn set_pool_weight(
        &mut self,
        caller: &AccountId,
        pool: PoolId,
        weight: Weight,
    ) -> Result<Option<Weight>, VaultError> {
        self.commit("set_pool_weight", |_, slot, net| {
            require(slot)?.set_pool_weight(&*net, caller, pool, weight)
        })
    }

    pub fn set_reward_receipt(
        &mut self,
        caller: &AccountId,
        receipt: AccountId,
    ) -> Result<(), VaultError> {
        self.commit("set_reward_receipt", |_, slot, _| {
            require(slot)?.set_reward_receipt(caller, receipt)
        })
    }

    pub fn set_unlock_policy(
        &mut self,
        caller: &AccountId,
        policy: UnlockPolicy,
    ) -> Result<(), VaultError> {
        self.commit("set_unlock_policy", |_, slot, _| {
            require(slot)?.set_unlock_policy(caller, policy)
        })
    }

    pub fn stake(&mut self, caller: &AccountId, amount: u64) -> Result<StakeReceipt, VaultError> {
        self.commit("stake", |_, slot, net| {
            require(slot)?.stake(net, caller, amount)
        })
    }

    pub fn unlock(
        &mut self,
        caller: &AccountId,
        derivative_amount: u64,
    ) -> Result<UnlockReceipt, VaultError> {
        self.commit("unlock", |_, slot, net| {
            require(slot)?.unlock(net, caller, derivative_amount)
        })
    }

    pub fn withdraw(&mut self, caller: &AccountId) -> Result<WithdrawReceipt, VaultError> {
        self.commit("withdraw", |_, slot, net| {
            require(slot)?.withdraw(net, caller)
        })
    }

    // =========================================================================
    // NETWORK CONTROL
    // =========================================================================

    pub fn fund(&mut self, account: &AccountId, amount: u64) -> Result<u64, VaultError> {
        self.commit("fund", |_, _, net| net.fund(account, amount))
    }

    /// Returns `false` if the pool already existed.
    pub fn register_pool(&mut self, pool: PoolId) -> Result<bool, VaultError> {
        self.commit("register_pool", |_, _, net| Ok(net.register_pool(pool)))
    }

    pub fn advance_epoch(&mut self, pool: &PoolId) -> Result<Epoch, VaultError> {
        self.commit("advance_epoch", |_, _, net| net.advance_epoch(pool))
    }

    pub fn distribute_rewards(&mut self, pool: &PoolId, amount: u64) -> Result<u64, VaultError> {
        self.commit("distribute_rewards", |_, _, net| {
            net.distribute_rewards(pool, amount)
        })
    }

    pub fn tick(&mut self, seconds: u64) -> Result<u64, VaultError> {
        self.commit("tick", |_, _, net| net.tick(seconds))
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn exchange_rate(&self) -> Result<ExchangeRate, VaultError> {
        self.vault()?.exchange_rate(&self.network)
    }

    pub fn preview_stake(&self, amount: u64) -> Result<u64, VaultError> {
        self.vault()?.preview_stake(&self.network, amount)
    }

    pub fn preview_unlock(&self, derivative_amount: u64) -> Result<u64, VaultError> {
        self.vault()?.preview_unlock(&self.network, derivative_amount)
    }

    pub fn total_stake(&self) -> Result<u64, VaultError> {
        self.vault()?.total_stake(&self.network)
    }

    pub fn pending_withdrawals(&self, account: &AccountId) -> Result<&[WithdrawalEntry], VaultError> {
        Ok(self.vault()?.pending_withdrawals(account))
    }

    pub fn derivative_balance(&self, account: &AccountId) -> Result<u64, VaultError> {
        Ok(self.vault()?.derivative_balance(&self.network, account))
    }

    #[must_use]
    pub fn base_balance(&self, account: &AccountId) -> u64 {
        self.network.base_balance(account)
    }

    #[must_use]
    pub fn now_seconds(&self) -> u64 {
        self.network.now_seconds()
    }

    pub fn pool_summary(&self, pool: &PoolId) -> Result<PoolSummary, VaultError> {
        self.network.pool_summary(pool)
    }
}

// =============================================================================
// TESTS
// =============================================================================
