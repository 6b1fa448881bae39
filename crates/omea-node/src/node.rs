//! Node composition.
//!
//! The [`Node`] wires the RocksDB store, the asset book and transfer journal
//! and a clock into an [`Engine`] and stamps every call with the clock's
//! current time.

use std::sync::Arc;

use tracing::info;

use omea_core::error::{LedgerError, OmeaError};
use omea_core::fees::PrincipalSplit;
use omea_core::traits::{Clock, SettlementStore, SystemClock};
use omea_core::types::{Address, Amount, Deposit, InvestmentInfo, Investor};
use omea_ledger::{DepositReceipt, Engine};

use crate::config::NodeConfig;
use crate::journal::{JournalEntry, JournalLedger};
use crate::storage::RocksStore;

pub struct Node {
    engine: Engine,
    journal: Arc<JournalLedger>,
    clock: Arc<dyn Clock>,
    config: NodeConfig,
}

impl Node {
    /// Open the node's storage under `config.db_path()` using wall-clock time.
    pub fn open(config: NodeConfig) -> Result<Arc<Self>, OmeaError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit clock.
    pub fn with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>, OmeaError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| OmeaError::Storage(e.to_string()))?;
        let store = Arc::new(RocksStore::open(config.db_path())?);
        let journal = Arc::new(JournalLedger::open(store, Arc::clone(&clock))?);

        let settlement: Arc<dyn SettlementStore> = journal.clone();
        let engine = Engine::open_settled(config.engine.clone(), settlement)?;

        info!(
            db = %config.db_path().display(),
            journaled = journal.len(),
            "node opened"
        );
        Ok(Arc::new(Self {
            engine,
            journal,
            clock,
            config,
        }))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn deposit(&self, investor: Address, gross: Amount, referrer: Option<Address>) -> Result<DepositReceipt, OmeaError> {
        self.engine.deposit(investor, gross, referrer, self.now())
    }

    pub fn claim_all_reward(&self, investor: Address) -> Result<Amount, OmeaError> {
        self.engine.claim_all_reward(investor, self.now())
    }

    pub fn add_bonus(&self, caller: Address, investor: Address, amount: Amount) -> Result<Amount, OmeaError> {
        self.engine.add_bonus(caller, investor, amount, self.now())
    }

    pub fn withdraw_principal(&self, investor: Address, amount: Amount) -> Result<PrincipalSplit, OmeaError> {
        self.engine.withdraw_principal(investor, amount, self.now())
    }

    pub fn launch(&self, caller: Address) -> Result<(), OmeaError> {
        self.engine.launch(caller)
    }

    pub fn get_hpr(&self, amount: Amount) -> u128 {
        self.engine.get_hpr(amount)
    }

    pub fn get_claimable_amount(&self, investor: &Address) -> Result<Amount, OmeaError> {
        self.engine.get_claimable_amount(investor, self.now())
    }

    pub fn deposits_of(&self, investor: &Address) -> Vec<Deposit> {
        self.engine.deposits_of(investor)
    }

    pub fn investor(&self, address: &Address) -> Option<Investor> {
        self.engine.investor(address)
    }

    pub fn investment_info(&self) -> InvestmentInfo {
        self.engine.investment_info()
    }

    /// Record an inbound transfer of the external asset to `owner`.
    /// Administrator only. Returns the new balance.
    pub fn credit(&self, caller: Address, owner: Address, amount: Amount) -> Result<Amount, OmeaError> {
        if caller != self.config.engine.admin {
            return Err(LedgerError::Unauthorized.into());
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.journal.credit(owner, amount)
    }

    /// Let `spender` pull up to `amount` from `owner`.
    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) -> Result<(), OmeaError> {
        self.journal.approve(owner, spender, amount)
    }

    pub fn balance_of(&self, owner: &Address) -> Result<Amount, OmeaError> {
        self.journal.balance_of(owner)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, OmeaError> {
        self.journal.allowance(owner, spender)
    }

    /// Journaled transfer batches starting at sequence `from`.
    pub fn transfers(&self, from: u64, limit: usize) -> Result<Vec<JournalEntry>, OmeaError> {
        self.journal.entries(from, limit)
    }
}
