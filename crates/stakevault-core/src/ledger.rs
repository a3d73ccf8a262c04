//! # Withdrawal Ledger
//!
//! Per-account queues of pending unlock requests.
//!
//! Each account owns an ordered sequence of [`WithdrawalEntry`] values in
//! request order. Entries are appended by unlock and removed exactly once by
//! a drain, after the entry's pool has moved past its recorded epoch.
//!
//! ## Draining
//!
//! A drain scans newest to oldest with a cursor counting down from `len`.
//! Removing at the cursor only shifts entries *after* it, which the scan has
//! already visited, so no entry is skipped and none is visited twice.
//!
//! The scan runs on a staged copy of the account's sequence. The copy
//! replaces the stored sequence only after every release succeeded, so a
//! failing release leaves the ledger untouched.

use crate::{AccountId, Epoch, PoolId, VaultError, WithdrawalEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a drain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrainOutcome {
    /// Entries released, newest first (scan order).
    pub released: Vec<WithdrawalEntry>,
    /// Entries still waiting on their pool's epoch.
    pub remaining: usize,
}

impl DrainOutcome {
    /// Sum of released amounts.
    pub fn total_released(&self) -> Result<u64, VaultError> {
        self.released
            .iter()
            .try_fold(0u64, |acc, e| acc.checked_add(e.amount))
            .ok_or(VaultError::ArithmeticOverflow)
    }
}

/// Account -> pending withdrawal entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithdrawalLedger {
    entries: BTreeMap<AccountId, Vec<WithdrawalEntry>>,
}

impl WithdrawalLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to `account`'s queue, creating it if absent.
    pub fn record_unlock(&mut self, account: AccountId, entry: WithdrawalEntry) {
        self.entries.entry(account).or_default().push(entry);
    }

    /// Pending entries for `account` in request order.
    #[must_use]
    pub fn pending(&self, account: &AccountId) -> &[WithdrawalEntry] {
        self.entries.get(account).map_or(&[], Vec::as_slice)
    }

    /// Total base units pending for `account`.
    pub fn pending_total(&self, account: &AccountId) -> Result<u64, VaultError> {
        self.pending(account)
            .iter()
            .try_fold(0u64, |acc, e| acc.checked_add(e.amount))
            .ok_or(VaultError::ArithmeticOverflow)
    }

    /// Number of accounts with at least one pending entry.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of pending entries across all accounts.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Release every claimable entry of `account`.
    ///
    /// `epoch_of` reports a pool's current observed epoch. `release` performs
    /// the external withdraw and transfer for one entry. Entries whose epoch
    /// has not passed stay in place, in order.
    ///
    /// Fails with `NoPendingWithdrawals` when the account has no entries.
    /// Releasing nothing while entries remain is a normal, successful drain.
    pub fn drain_claimable<E, R>(
        &mut self,
        account: &AccountId,
        mut epoch_of: E,
        mut release: R,
    ) -> Result<DrainOutcome, VaultError>
    where
        E: FnMut(&PoolId) -> Result<Epoch, VaultError>,
        R: FnMut(&WithdrawalEntry) -> Result<(), VaultError>,
    {
        let stored = match self.entries.get(account) {
            Some(list) if !list.is_empty() => list,
            _ => return Err(VaultError::NoPendingWithdrawals),
        };

        let mut staged = stored.clone();
        let mut epochs: BTreeMap<PoolId, Epoch> = BTreeMap::new();
        let mut released = Vec::new();

        let mut cursor = staged.len();
        while cursor > 0 {
            cursor -= 1;
            let current = match epochs.get(&staged[cursor].pool) {
                Some(epoch) => *epoch,
                None => {
                    let epoch = epoch_of(&staged[cursor].pool)?;
                    epochs.insert(staged[cursor].pool.clone(), epoch);
                    epoch
                }
            };
            if staged[cursor].is_claimable(current) {
                release(&staged[cursor])?;
                released.push(staged.remove(cursor));
            }
        }

        let remaining = staged.len();
        if staged.is_empty() {
            self.entries.remove(account);
        } else {
            self.entries.insert(account.clone(), staged);
        }

        Ok(DrainOutcome {
            released,
            remaining,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
