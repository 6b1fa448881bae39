//! RocksDB-backed persistent ledger storage.
//!
//! Implements [`LedgerStore`] using RocksDB column families for investor
//! records, protocol metadata, the asset book and the transfer journal.
//! Every commit is a single atomic [`WriteBatch`]; a settlement writes the
//! ledger change, the touched book entries and the journal entry together.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use omea_core::asset::{Book, TransferBatch};
use omea_core::error::OmeaError;
use omea_core::store::{Changeset, LedgerSnapshot};
use omea_core::traits::LedgerStore;
use omea_core::types::{Address, Amount, Investor, ProtocolState};

use crate::journal::JournalEntry;

// --- Column family names ---

const CF_INVESTORS: &str = "investors";
const CF_METADATA: &str = "metadata";
const CF_TRANSFERS: &str = "transfers";
const CF_BALANCES: &str = "balances";
const CF_ALLOWANCES: &str = "allowances";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_INVESTORS, CF_METADATA, CF_TRANSFERS, CF_BALANCES, CF_ALLOWANCES];

// --- Metadata keys ---

const META_PROTOCOL: &[u8] = b"protocol";
const META_LAUNCHED: &[u8] = b"launched";
const META_NEXT_TRANSFER: &[u8] = b"next_transfer_seq";

fn storage_err(e: impl std::fmt::Display) -> OmeaError {
    OmeaError::Storage(e.to_string())
}

/// RocksDB-backed ledger storage.
///
/// Investor records are keyed by their 20 address bytes; values and
/// metadata are bincode-encoded.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OmeaError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(storage_err)?;
        Ok(Self { db })
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, OmeaError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| OmeaError::Storage(format!("missing column family: {name}")))
    }

    fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, OmeaError> {
        bincode::encode_to_vec(value, bincode::config::standard()).map_err(storage_err)
    }

    fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, OmeaError> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(storage_err)
    }

    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, OmeaError> {
        let cf = self.cf_handle(CF_METADATA)?;
        self.db.get_cf(cf, key).map_err(storage_err)
    }

    /// Point lookup of one investor record.
    pub fn get_investor(&self, address: &Address) -> Result<Option<Investor>, OmeaError> {
        let cf = self.cf_handle(CF_INVESTORS)?;
        match self.db.get_cf(cf, address.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of investor records stored.
    pub fn investor_count(&self) -> Result<usize, OmeaError> {
        let cf = self.cf_handle(CF_INVESTORS)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(storage_err)?;
            count += 1;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Asset book
    // ------------------------------------------------------------------

    fn get_amount(&self, cf_name: &str, key: &[u8]) -> Result<Amount, OmeaError> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => {
                let buf: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| OmeaError::Storage(format!("invalid amount length: {}", bytes.len())))?;
                Ok(Amount::from_be_bytes(buf))
            }
            None => Ok(0),
        }
    }

    pub fn balance_of(&self, owner: &Address) -> Result<Amount, OmeaError> {
        self.get_amount(CF_BALANCES, owner.as_bytes())
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, OmeaError> {
        self.get_amount(CF_ALLOWANCES, &allowance_key(owner, spender))
    }

    /// The book entries `batch` touches, read from disk.
    pub fn book_for(&self, batch: &TransferBatch) -> Result<Book, OmeaError> {
        let mut book = Book::default();
        for account in batch.accounts() {
            book.set_balance(account, self.balance_of(&account)?);
        }
        for (owner, spender) in batch.allowances() {
            book.set_allowance(owner, spender, self.allowance(&owner, &spender)?);
        }
        Ok(book)
    }

    // ------------------------------------------------------------------
    // Transfer journal
    // ------------------------------------------------------------------

    /// Sequence number the next journal entry will get.
    pub fn next_transfer_seq(&self) -> Result<u64, OmeaError> {
        match self.get_meta(META_NEXT_TRANSFER)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(buf))
            }
            Some(_) => Err(OmeaError::Storage("invalid transfer sequence length".into())),
            None => Ok(0),
        }
    }

    /// Up to `limit` journal entries starting at sequence `from`, in order.
    pub fn transfers_from(&self, from: u64, limit: usize) -> Result<Vec<JournalEntry>, OmeaError> {
        let cf = self.cf_handle(CF_TRANSFERS)?;
        let start = from.to_be_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start[..], rocksdb::Direction::Forward));

        let mut out = Vec::new();
        for item in iter.take(limit) {
            let (_, value) = item.map_err(storage_err)?;
            out.push(Self::decode(&value)?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn stage_changeset(&self, batch: &mut WriteBatch, changes: &Changeset) -> Result<(), OmeaError> {
        let cf_investors = self.cf_handle(CF_INVESTORS)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;

        for (address, investor) in &changes.upserts {
            batch.put_cf(cf_investors, address.as_bytes(), Self::encode(investor)?);
        }
        for address in &changes.deletes {
            batch.delete_cf(cf_investors, address.as_bytes());
        }
        if let Some(protocol) = &changes.protocol {
            batch.put_cf(cf_meta, META_PROTOCOL, Self::encode(protocol)?);
        }
        if let Some(launched) = changes.launched {
            batch.put_cf(cf_meta, META_LAUNCHED, [u8::from(launched)]);
        }
        Ok(())
    }

    /// Write a ledger change, every entry of `book` and an optional journal
    /// entry in one atomic batch. The journal entry also advances the
    /// sequence counter.
    pub fn write_settlement(
        &self,
        changes: &Changeset,
        book: &Book,
        entry: Option<&JournalEntry>,
    ) -> Result<(), OmeaError> {
        let cf_balances = self.cf_handle(CF_BALANCES)?;
        let cf_allowances = self.cf_handle(CF_ALLOWANCES)?;

        let mut batch = WriteBatch::default();
        self.stage_changeset(&mut batch, changes)?;
        for (owner, amount) in book.balances() {
            batch.put_cf(cf_balances, owner.as_bytes(), amount.to_be_bytes());
        }
        for ((owner, spender), amount) in book.allowances() {
            batch.put_cf(cf_allowances, allowance_key(owner, spender), amount.to_be_bytes());
        }
        if let Some(entry) = entry {
            let cf_transfers = self.cf_handle(CF_TRANSFERS)?;
            let cf_meta = self.cf_handle(CF_METADATA)?;
            batch.put_cf(cf_transfers, entry.seq.to_be_bytes(), Self::encode(entry)?);
            batch.put_cf(cf_meta, META_NEXT_TRANSFER, (entry.seq + 1).to_be_bytes());
        }
        self.db.write(batch).map_err(storage_err)
    }
}

/// Allowance key: owner bytes followed by spender bytes.
fn allowance_key(owner: &Address, spender: &Address) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..20].copy_from_slice(owner.as_bytes());
    key[20..].copy_from_slice(spender.as_bytes());
    key
}

impl LedgerStore for RocksStore {
    fn load(&self) -> Result<LedgerSnapshot, OmeaError> {
        let mut snapshot = LedgerSnapshot::default();

        let cf = self.cf_handle(CF_INVESTORS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            let bytes: [u8; 20] = key
                .as_ref()
                .try_into()
                .map_err(|_| OmeaError::Storage(format!("invalid investor key length: {}", key.len())))?;
            snapshot.investors.insert(Address(bytes), Self::decode(&value)?);
        }

        if let Some(bytes) = self.get_meta(META_PROTOCOL)? {
            snapshot.protocol = Self::decode::<ProtocolState>(&bytes)?;
        }
        if let Some(bytes) = self.get_meta(META_LAUNCHED)? {
            snapshot.launched = bytes.first().is_some_and(|b| *b != 0);
        }
        Ok(snapshot)
    }

    fn commit(&self, changes: &Changeset) -> Result<(), OmeaError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::default();
        self.stage_changeset(&mut batch, changes)?;
        self.db.write(batch).map_err(storage_err)
    }
}
