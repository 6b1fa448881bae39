//! Ledger persistence types and an in-memory store.
//!
//! A [`LedgerStore`](crate::traits::LedgerStore) holds exactly the durable
//! state of the engine: the investor map, the protocol counters and the
//! launch flag. Writes arrive as a [`Changeset`] that must be applied
//! atomically. [`MemoryLedgerStore`] is suitable for testing; the node uses
//! RocksDB (omea-node-lib).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::OmeaError;
use crate::traits::LedgerStore;
use crate::types::{Address, Investor, ProtocolState};

/// Everything a store holds, as loaded at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub investors: HashMap<Address, Investor>,
    pub protocol: ProtocolState,
    pub launched: bool,
}

/// An atomic set of writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Records to insert or overwrite.
    pub upserts: Vec<(Address, Investor)>,
    /// Records to remove. Only produced when rolling back a record that did
    /// not exist before the failed operation.
    pub deletes: Vec<Address>,
    pub protocol: Option<ProtocolState>,
    pub launched: Option<bool>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty()
            && self.deletes.is_empty()
            && self.protocol.is_none()
            && self.launched.is_none()
    }
}

/// In-memory ledger store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<LedgerSnapshot>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `snapshot`.
    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Point lookup of one investor record.
    pub fn get_investor(&self, address: &Address) -> Option<Investor> {
        self.inner.read().investors.get(address).cloned()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<LedgerSnapshot, OmeaError> {
        Ok(self.inner.read().clone())
    }

    fn commit(&self, changes: &Changeset) -> Result<(), OmeaError> {
        let mut inner = self.inner.write();
        for (address, investor) in &changes.upserts {
            inner.investors.insert(*address, investor.clone());
        }
        for address in &changes.deletes {
            inner.investors.remove(address);
        }
        if let Some(protocol) = changes.protocol {
            inner.protocol = protocol;
        }
        if let Some(launched) = changes.launched {
            inner.launched = launched;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Deposit;

    fn addr(seed: u8) -> Address {
        Address([seed; 20])
    }

    fn investor(total: u128) -> Investor {
        Investor {
            total_invested: total,
            deposits: vec![Deposit { amount: total, timestamp: 0 }],
            ..Investor::default()
        }
    }

    #[test]
    fn empty_store_loads_default() {
        let store = MemoryLedgerStore::new();
        assert_eq!(store.load().unwrap(), LedgerSnapshot::default());
    }

    #[test]
    fn commit_applies_every_part() {
        let store = MemoryLedgerStore::new();
        let changes = Changeset {
            upserts: vec![(addr(1), investor(96))],
            deletes: vec![],
            protocol: Some(ProtocolState {
                total_investors: 1,
                total_value_locked: 96,
                ..ProtocolState::default()
            }),
            launched: Some(true),
        };
        store.commit(&changes).unwrap();

        let snap = store.load().unwrap();
        assert!(snap.launched);
        assert_eq!(snap.protocol.total_value_locked, 96);
        assert_eq!(store.get_investor(&addr(1)), Some(investor(96)));
    }

    #[test]
    fn commit_deletes_records() {
        let store = MemoryLedgerStore::new();
        store
            .commit(&Changeset {
                upserts: vec![(addr(1), investor(1)), (addr(2), investor(2))],
                ..Changeset::default()
            })
            .unwrap();
        store
            .commit(&Changeset {
                deletes: vec![addr(1)],
                ..Changeset::default()
            })
            .unwrap();
        assert!(store.get_investor(&addr(1)).is_none());
        assert!(store.get_investor(&addr(2)).is_some());
    }

    #[test]
    fn empty_changeset_leaves_store_untouched() {
        let store = MemoryLedgerStore::with_snapshot(LedgerSnapshot {
            launched: true,
            ..LedgerSnapshot::default()
        });
        assert!(Changeset::default().is_empty());
        store.commit(&Changeset::default()).unwrap();
        assert!(store.load().unwrap().launched);
    }
}
