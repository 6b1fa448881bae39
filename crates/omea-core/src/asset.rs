//! Asset transfer batches and an in-memory asset ledger.
//!
//! The engine never moves tokens itself. Each ledger mutation produces a
//! [`TransferBatch`] that an [`AssetLedger`](crate::traits::AssetLedger)
//! executes all-or-nothing. [`Book`] holds the ERC-20 style transfer rules;
//! [`MemoryAssetLedger`] keeps a whole book in memory for tests and local
//! tooling, and the node keeps one in RocksDB.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::AssetError;
use crate::traits::AssetLedger;
use crate::types::{Address, Amount};

/// One movement of the asset.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum TransferLeg {
    /// `transferFrom(from, to, amount)` spent against `from`'s allowance to custody.
    Pull { from: Address, to: Address, amount: Amount },
    /// `transfer(to, amount)` out of the custody account.
    Push { to: Address, amount: Amount },
}

impl TransferLeg {
    pub fn amount(&self) -> Amount {
        match self {
            Self::Pull { amount, .. } | Self::Push { amount, .. } => *amount,
        }
    }
}

/// Transfers that must succeed or fail together.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct TransferBatch {
    /// The protocol's custody account: spender for pulls, sender for pushes.
    pub custody: Address,
    pub legs: Vec<TransferLeg>,
}

impl TransferBatch {
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            legs: Vec::new(),
        }
    }

    /// Append a pull leg. Zero-amount legs are dropped.
    pub fn pull(mut self, from: Address, to: Address, amount: Amount) -> Self {
        if amount > 0 {
            self.legs.push(TransferLeg::Pull { from, to, amount });
        }
        self
    }

    /// Append a push leg. Zero-amount legs are dropped.
    pub fn push(mut self, to: Address, amount: Amount) -> Self {
        if amount > 0 {
            self.legs.push(TransferLeg::Push { to, amount });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Accounts whose balance the batch reads or writes.
    pub fn accounts(&self) -> Vec<Address> {
        let mut out = vec![self.custody];
        for leg in &self.legs {
            match leg {
                TransferLeg::Pull { from, to, .. } => out.extend([*from, *to]),
                TransferLeg::Push { to, .. } => out.push(*to),
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// (owner, spender) allowances the batch spends.
    pub fn allowances(&self) -> Vec<(Address, Address)> {
        let mut out: Vec<_> = self
            .legs
            .iter()
            .filter_map(|leg| match leg {
                TransferLeg::Pull { from, .. } => Some((*from, self.custody)),
                TransferLeg::Push { .. } => None,
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// Balances and allowances of the asset under ERC-20 transfer rules.
///
/// A book may hold only the entries a batch touches; missing entries read
/// as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Book {
    balances: HashMap<Address, Amount>,
    /// (owner, spender) → remaining allowance.
    allowances: HashMap<(Address, Address), Amount>,
}

impl Book {
    pub fn balance(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    pub fn set_balance(&mut self, owner: Address, amount: Amount) {
        self.balances.insert(owner, amount);
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    pub fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn allowances(&self) -> impl Iterator<Item = (&(Address, Address), &Amount)> {
        self.allowances.iter()
    }

    fn debit(&mut self, owner: &Address, amount: Amount) -> Result<(), AssetError> {
        let have = self.balance(owner);
        if have < amount {
            return Err(AssetError::InsufficientBalance {
                owner: owner.to_string(),
                have,
                need: amount,
            });
        }
        self.balances.insert(*owner, have - amount);
        Ok(())
    }

    pub fn credit(&mut self, owner: &Address, amount: Amount) -> Result<(), AssetError> {
        let entry = self.balances.entry(*owner).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| AssetError::Rejected("balance overflow".into()))?;
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) -> Result<(), AssetError> {
        let have = self.allowance(owner, spender);
        if have < amount {
            return Err(AssetError::InsufficientAllowance {
                owner: owner.to_string(),
                have,
                need: amount,
            });
        }
        self.allowances.insert((*owner, *spender), have - amount);
        Ok(())
    }

    fn apply(&mut self, custody: &Address, leg: &TransferLeg) -> Result<(), AssetError> {
        match leg {
            TransferLeg::Pull { from, to, amount } => {
                self.spend_allowance(from, custody, *amount)?;
                self.debit(from, *amount)?;
                self.credit(to, *amount)
            }
            TransferLeg::Push { to, amount } => {
                self.debit(custody, *amount)?;
                self.credit(to, *amount)
            }
        }
    }

    /// Apply every leg of `batch`, or none of them.
    pub fn execute(&mut self, batch: &TransferBatch) -> Result<(), AssetError> {
        let mut scratch = self.clone();
        for leg in &batch.legs {
            scratch.apply(&batch.custody, leg)?;
        }
        *self = scratch;
        Ok(())
    }
}

/// In-memory ERC-20 style asset ledger.
#[derive(Debug, Default)]
pub struct MemoryAssetLedger {
    book: Mutex<Book>,
}

impl MemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `owner` out of thin air.
    pub fn mint(&self, owner: &Address, amount: Amount) -> Result<(), AssetError> {
        self.book.lock().credit(owner, amount)
    }

    /// Set the allowance `owner` grants to `spender`.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: Amount) {
        self.book.lock().set_allowance(*owner, *spender, amount);
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        self.book.lock().balance(owner)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.book.lock().allowance(owner, spender)
    }
}

impl AssetLedger for MemoryAssetLedger {
    fn execute(&self, batch: &TransferBatch) -> Result<(), AssetError> {
        self.book.lock().execute(batch)
    }
}
