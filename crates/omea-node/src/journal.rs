//! Asset book and transfer journal.
//!
//! The node mirrors the external asset in a RocksDB book of balances and
//! allowances. [`JournalLedger`] checks every transfer batch the engine
//! produces against that book and writes the ledger change, the updated
//! book entries and the batch itself in one atomic RocksDB write. Journaled
//! batches carry a gap-free sequence number so an external settlement
//! service can execute them in order.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use omea_core::asset::{Book, TransferBatch};
use omea_core::error::OmeaError;
use omea_core::store::{Changeset, LedgerSnapshot};
use omea_core::traits::{Clock, LedgerStore, SettlementStore};
use omea_core::types::{Address, Amount};

use crate::storage::RocksStore;

/// One journaled batch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct JournalEntry {
    pub seq: u64,
    /// Unix seconds at which the batch was accepted.
    pub recorded_at: u64,
    pub batch: TransferBatch,
}

/// [`SettlementStore`] over [`RocksStore`] that journals accepted batches.
pub struct JournalLedger {
    store: Arc<RocksStore>,
    clock: Arc<dyn Clock>,
    /// Next sequence number. Held across every book read-modify-write so
    /// funding and settlements are serialized and entries stay gap-free.
    next_seq: Mutex<u64>,
}

impl JournalLedger {
    pub fn open(store: Arc<RocksStore>, clock: Arc<dyn Clock>) -> Result<Self, OmeaError> {
        let next_seq = store.next_transfer_seq()?;
        Ok(Self {
            store,
            clock,
            next_seq: Mutex::new(next_seq),
        })
    }

    /// Number of batches journaled so far.
    pub fn len(&self) -> u64 {
        *self.next_seq.lock()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self, from: u64, limit: usize) -> Result<Vec<JournalEntry>, OmeaError> {
        self.store.transfers_from(from, limit)
    }

    pub fn balance_of(&self, owner: &Address) -> Result<Amount, OmeaError> {
        self.store.balance_of(owner)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, OmeaError> {
        self.store.allowance(owner, spender)
    }

    /// Record `amount` of the asset arriving at `owner` on the external ledger.
    pub fn credit(&self, owner: Address, amount: Amount) -> Result<Amount, OmeaError> {
        let _guard = self.next_seq.lock();
        let mut book = Book::default();
        book.set_balance(owner, self.store.balance_of(&owner)?);
        book.credit(&owner, amount)?;
        self.store.write_settlement(&Changeset::default(), &book, None)?;
        let balance = book.balance(&owner);
        info!(%owner, amount = %amount, balance = %balance, "balance credited");
        Ok(balance)
    }

    /// Set the allowance `owner` grants to `spender`.
    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) -> Result<(), OmeaError> {
        let _guard = self.next_seq.lock();
        let mut book = Book::default();
        book.set_allowance(owner, spender, amount);
        self.store.write_settlement(&Changeset::default(), &book, None)?;
        debug!(%owner, %spender, amount = %amount, "allowance set");
        Ok(())
    }
}

impl LedgerStore for JournalLedger {
    fn load(&self) -> Result<LedgerSnapshot, OmeaError> {
        self.store.load()
    }

    fn commit(&self, changes: &Changeset) -> Result<(), OmeaError> {
        self.store.commit(changes)
    }
}

impl SettlementStore for JournalLedger {
    fn commit_with_transfers(&self, changes: &Changeset, batch: &TransferBatch) -> Result<(), OmeaError> {
        let mut next_seq = self.next_seq.lock();
        if batch.is_empty() {
            return self.store.write_settlement(changes, &Book::default(), None);
        }

        let mut book = self.store.book_for(batch)?;
        book.execute(batch)?;
        let entry = JournalEntry {
            seq: *next_seq,
            recorded_at: self.clock.now(),
            batch: batch.clone(),
        };
        self.store.write_settlement(changes, &book, Some(&entry))?;
        *next_seq += 1;
        debug!(seq = entry.seq, legs = batch.legs.len(), "transfer batch journaled");
        Ok(())
    }
}
