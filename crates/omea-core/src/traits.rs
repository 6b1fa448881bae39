//! Trait interfaces for the OMEA protocol.
//!
//! These traits define the seams between the accounting engine and the
//! outside world:
//! - [`AssetLedger`]: the transferable asset (omea-node-lib journals to RocksDB)
//! - [`LedgerStore`]: durable ledger state
//! - [`SettlementStore`]: a store that also keeps the asset book, so a ledger
//!   change and its transfers are written in one unit (omea-node-lib's
//!   RocksDB journal)
//! - [`Clock`]: source of the current timestamp for callers of the engine

use crate::asset::TransferBatch;
use crate::error::{AssetError, OmeaError};
use crate::store::{Changeset, LedgerSnapshot};

/// The external asset contract.
///
/// Implementations must apply a batch all-or-nothing: either every leg
/// takes effect or none does.
pub trait AssetLedger: Send + Sync {
    /// Execute every leg of `batch` atomically.
    fn execute(&self, batch: &TransferBatch) -> Result<(), AssetError>;
}

/// Durable storage of the ledger.
///
/// Must offer point lookup by address (used by `load`) and atomic
/// multi-record writes (used by `commit`).
pub trait LedgerStore: Send + Sync {
    /// Load the complete ledger state.
    fn load(&self) -> Result<LedgerSnapshot, OmeaError>;

    /// Apply `changes` atomically.
    fn commit(&self, changes: &Changeset) -> Result<(), OmeaError>;
}

/// Durable storage that also keeps the asset book.
///
/// Used instead of a separate [`AssetLedger`] when both live in one
/// database: the transfers are checked against the book and written with
/// the ledger change atomically, so no rollback write is ever needed.
pub trait SettlementStore: LedgerStore {
    /// Check `batch` against the book, then persist `changes`, the updated
    /// book entries and the batch itself as one atomic write. On any error
    /// nothing is written.
    fn commit_with_transfers(&self, changes: &Changeset, batch: &TransferBatch) -> Result<(), OmeaError>;
}

/// Source of "now" in Unix seconds.
///
/// The engine itself always takes time as an explicit argument; only the
/// outer layers read a clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // Pre-1970 clocks are treated as the epoch.
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}
