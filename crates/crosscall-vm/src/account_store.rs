//! Per-account storage, big integer registry and balances.
//!
//! Every mutation is recorded in an undo journal. A frame takes a
//! [`Checkpoint`] when it starts; on failure everything after the checkpoint
//! is undone, on a committing success the entries are dropped so that no
//! later revert can touch them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bytes::Bytes;
use num_bigint::BigInt;
use tracing::trace;

use crosscall_types::{Address, U256};

use crate::error::VmError;

/// Opaque per-account identifier of a big integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BigIntHandle(pub i32);

impl From<i32> for BigIntHandle {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for BigIntHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Effect of a storage write on the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

/// A value transfer performed during the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTransfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// State of a single account.
#[derive(Debug, Clone, Default)]
pub struct Account {
    balance: U256,
    storage: HashMap<Vec<u8>, Vec<u8>>,
    bigints: HashMap<BigIntHandle, BigInt>,
    next_handle: i32,
}

impl Account {
    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn storage(&self) -> &HashMap<Vec<u8>, Vec<u8>> {
        &self.storage
    }

    pub fn bigint_count(&self) -> usize {
        self.bigints.len()
    }
}

/// Position in the undo journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Checkpoint(usize);

#[derive(Debug, Clone)]
enum JournalEntry {
    Storage {
        address: Address,
        key: Vec<u8>,
        previous: Option<Vec<u8>>,
    },
    BigInt {
        address: Address,
        handle: BigIntHandle,
        previous: Option<BigInt>,
    },
    NextHandle {
        address: Address,
        previous: i32,
    },
    // Balances are undone by delta so committed transfers of nested
    // frames survive a revert of their ancestors.
    Credit {
        address: Address,
        amount: U256,
    },
    Debit {
        address: Address,
        amount: U256,
    },
    Transfer {
        index: usize,
    },
}

/// All accounts touched by the host, with their undo journal.
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    accounts: HashMap<Address, Account>,
    journal: Vec<JournalEntry>,
    transfers: Vec<OutputTransfer>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    fn account_mut(&mut self, address: &Address) -> &mut Account {
        self.accounts.entry(*address).or_default()
    }

    /// Stored value under `key`, empty when unset.
    pub fn get_storage(&self, address: &Address, key: &[u8]) -> &[u8] {
        self.accounts
            .get(address)
            .and_then(|account| account.storage.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Store `value` under `key`; an empty value deletes the entry.
    pub fn set_storage(&mut self, address: &Address, key: &[u8], value: &[u8]) -> StorageStatus {
        let account = self.account_mut(address);
        let previous = account.storage.get(key).cloned();
        let status = match (&previous, value.is_empty()) {
            (None, true) => return StorageStatus::Unchanged,
            (Some(old), false) if old.as_slice() == value => return StorageStatus::Unchanged,
            (None, false) => StorageStatus::Added,
            (Some(_), false) => StorageStatus::Modified,
            (Some(_), true) => StorageStatus::Deleted,
        };

        if value.is_empty() {
            account.storage.remove(key);
        } else {
            account.storage.insert(key.to_vec(), value.to_vec());
        }
        self.journal.push(JournalEntry::Storage {
            address: *address,
            key: key.to_vec(),
            previous,
        });
        trace!(account = %address.short(), key = %hex::encode(key), ?status, "Storage write");
        status
    }

    pub fn get_bigint(&self, address: &Address, handle: BigIntHandle) -> Option<&BigInt> {
        self.accounts
            .get(address)
            .and_then(|account| account.bigints.get(&handle))
    }

    pub fn set_bigint(&mut self, address: &Address, handle: BigIntHandle, value: BigInt) {
        let previous = self.account_mut(address).bigints.insert(handle, value);
        self.journal.push(JournalEntry::BigInt {
            address: *address,
            handle,
            previous,
        });
    }

    /// Reserve a handle not yet used in `address`'s registry.
    pub fn allocate_bigint_handle(&mut self, address: &Address) -> BigIntHandle {
        let account = self.account_mut(address);
        let previous = account.next_handle;
        let mut next = previous;
        while account.bigints.contains_key(&BigIntHandle(next)) {
            next = next.wrapping_add(1);
        }
        account.next_handle = next.wrapping_add(1);
        self.journal.push(JournalEntry::NextHandle {
            address: *address,
            previous,
        });
        BigIntHandle(next)
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or(U256::ZERO)
    }

    /// Set a balance outside of any transaction.
    pub fn seed_balance(&mut self, address: &Address, balance: U256) {
        self.account_mut(address).balance = balance;
    }

    /// Set a storage entry outside of any transaction.
    pub fn seed_storage(&mut self, address: &Address, key: &[u8], value: &[u8]) {
        let storage = &mut self.account_mut(address).storage;
        if value.is_empty() {
            storage.remove(key);
        } else {
            storage.insert(key.to_vec(), value.to_vec());
        }
    }

    /// Move `amount` between accounts without logging a transfer.
    pub fn move_balance(&mut self, from: &Address, to: &Address, amount: U256) -> Result<(), VmError> {
        if to.is_zero() {
            return Err(VmError::InvalidAddress(*to));
        }
        if amount.is_zero() {
            return Ok(());
        }

        let available = self.balance(from);
        let remaining = available
            .checked_sub(&amount)
            .ok_or(VmError::InsufficientBalance {
                required: amount,
                available,
            })?;
        self.account_mut(from).balance = remaining;
        self.journal.push(JournalEntry::Debit {
            address: *from,
            amount,
        });

        let credited = self.balance(to).saturating_add(&amount);
        self.account_mut(to).balance = credited;
        self.journal.push(JournalEntry::Credit {
            address: *to,
            amount,
        });
        Ok(())
    }

    /// Move `amount` between accounts and record it in the transfer log.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: U256,
        data: Bytes,
    ) -> Result<(), VmError> {
        self.move_balance(from, to, amount)?;
        self.journal.push(JournalEntry::Transfer {
            index: self.transfers.len(),
        });
        self.transfers.push(OutputTransfer {
            from: *from,
            to: *to,
            value: amount,
            data,
        });
        Ok(())
    }

    pub fn transfers(&self) -> &[OutputTransfer] {
        &self.transfers
    }

    /// Start a new transaction: forget the journal and the transfer log.
    pub fn begin_transaction(&mut self) {
        self.journal.clear();
        self.transfers.clear();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Number of uncommitted journal entries.
    pub fn pending_changes(&self) -> usize {
        self.journal.len()
    }

    /// Make every change since `checkpoint` permanent.
    ///
    /// Older entries of the same storage slot, big integer or handle counter
    /// are rebased onto the committed value, so a later revert of an
    /// ancestor restores what was committed instead of what it overwrote.
    pub fn commit_to(&mut self, checkpoint: Checkpoint) {
        if checkpoint.0 >= self.journal.len() {
            return;
        }
        let committed = self.journal.split_off(checkpoint.0);
        if self.journal.is_empty() {
            return;
        }

        let mut slots = HashSet::new();
        let mut handles = HashSet::new();
        let mut counters = HashSet::new();
        for entry in &committed {
            match entry {
                JournalEntry::Storage { address, key, .. } => {
                    slots.insert((*address, key.clone()));
                }
                JournalEntry::BigInt {
                    address, handle, ..
                } => {
                    handles.insert((*address, *handle));
                }
                JournalEntry::NextHandle { address, .. } => {
                    counters.insert(*address);
                }
                _ => {}
            }
        }

        for entry in self.journal.iter_mut() {
            match entry {
                JournalEntry::Storage {
                    address,
                    key,
                    previous,
                } if slots.contains(&(*address, key.clone())) => {
                    *previous = self
                        .accounts
                        .get(&*address)
                        .and_then(|account| account.storage.get(key.as_slice()))
                        .cloned();
                }
                JournalEntry::BigInt {
                    address,
                    handle,
                    previous,
                } if handles.contains(&(*address, *handle)) => {
                    *previous = self
                        .accounts
                        .get(&*address)
                        .and_then(|account| account.bigints.get(&*handle))
                        .cloned();
                }
                JournalEntry::NextHandle { address, previous } if counters.contains(&*address) => {
                    if let Some(account) = self.accounts.get(&*address) {
                        *previous = account.next_handle;
                    }
                }
                _ => {}
            }
        }
        trace!(
            committed = committed.len(),
            pending = self.journal.len(),
            "Committed nested changes"
        );
    }

    /// Undo every uncommitted change made since `checkpoint`.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            self.undo(entry);
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Storage {
                address,
                key,
                previous,
            } => {
                let storage = &mut self.account_mut(&address).storage;
                match previous {
                    Some(value) => storage.insert(key, value),
                    None => storage.remove(&key),
                };
            }
            JournalEntry::BigInt {
                address,
                handle,
                previous,
            } => {
                let bigints = &mut self.account_mut(&address).bigints;
                match previous {
                    Some(value) => bigints.insert(handle, value),
                    None => bigints.remove(&handle),
                };
            }
            JournalEntry::NextHandle { address, previous } => {
                self.account_mut(&address).next_handle = previous;
            }
            JournalEntry::Credit { address, amount } => {
                let account = self.account_mut(&address);
                account.balance = account.balance.saturating_sub(&amount);
            }
            JournalEntry::Debit { address, amount } => {
                let account = self.account_mut(&address);
                account.balance = account.balance.saturating_add(&amount);
            }
            JournalEntry::Transfer { index } => {
                if index < self.transfers.len() {
                    self.transfers.remove(index);
                }
            }
        }
    }
}
