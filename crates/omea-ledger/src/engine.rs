//! The serialized accounting engine.
//!
//! [`Engine`] owns the live [`LedgerState`] behind a `RwLock`. Every mutating
//! operation holds the write lock for its whole duration, so operations are
//! totally ordered; queries take the read lock and never observe a partial
//! update.
//!
//! A mutation is staged first and applied to memory only once it is durable
//! and its [`TransferBatch`](omea_core::asset::TransferBatch) has succeeded.
//! How that happens depends on the backend:
//!
//! - with a [`SettlementStore`], the changeset and the batch go to the store
//!   in one atomic write, which rejects the whole unit if a transfer leg
//!   does not fit the asset book;
//! - with a separate [`LedgerStore`] and [`AssetLedger`], the changeset is
//!   persisted, then the batch executed; if the transfer fails, the rollback
//!   changeset is persisted and the error returned.
//!
//! Either way memory is untouched on failure.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use omea_core::error::{LedgerError, OmeaError};
use omea_core::fees::PrincipalSplit;
use omea_core::rate::hourly_rate_bp;
use omea_core::store::LedgerSnapshot;
use omea_core::traits::{AssetLedger, LedgerStore, SettlementStore};
use omea_core::types::{Address, Amount, Deposit, InvestmentInfo, Investor, ProtocolState};

use crate::config::EngineConfig;
use crate::ledger::{self, Applied, DepositReceipt, LedgerState, Staged};
use crate::referral;

/// Where committed changes and their transfers go.
enum Backend {
    Split {
        store: Arc<dyn LedgerStore>,
        assets: Arc<dyn AssetLedger>,
    },
    Settled(Arc<dyn SettlementStore>),
}

pub struct Engine {
    config: EngineConfig,
    state: RwLock<LedgerState>,
    backend: Backend,
}

impl Engine {
    /// Load the ledger from `store` and wire up a separate asset ledger.
    pub fn open(
        config: EngineConfig,
        store: Arc<dyn LedgerStore>,
        assets: Arc<dyn AssetLedger>,
    ) -> Result<Self, OmeaError> {
        let state = Self::load(store.load()?);
        Ok(Self {
            config,
            state: RwLock::new(state),
            backend: Backend::Split { store, assets },
        })
    }

    /// Load the ledger from a store that also settles transfers.
    pub fn open_settled(config: EngineConfig, store: Arc<dyn SettlementStore>) -> Result<Self, OmeaError> {
        let state = Self::load(store.load()?);
        Ok(Self {
            config,
            state: RwLock::new(state),
            backend: Backend::Settled(store),
        })
    }

    fn load(snapshot: LedgerSnapshot) -> LedgerState {
        let state = LedgerState::from_snapshot(snapshot);
        info!(
            investors = state.protocol().total_investors,
            tvl = %state.protocol().total_value_locked,
            launched = state.launched(),
            "ledger loaded"
        );
        state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Deposit `gross` for `investor`, optionally naming a referrer.
    ///
    /// Returns what the deposit recorded.
    pub fn deposit(
        &self,
        investor: Address,
        gross: Amount,
        referrer: Option<Address>,
        now: u64,
    ) -> Result<DepositReceipt, OmeaError> {
        let receipt = self.mutate("deposit", |staged, cfg| {
            ledger::deposit(staged, cfg, investor, gross, referrer, now)
        })?;
        info!(
            %investor,
            gross = %gross,
            net = %receipt.net_principal,
            first = receipt.first_deposit,
            "deposit recorded"
        );
        Ok(receipt)
    }

    /// Pay out all settled reward and unclaimed bonus. Returns the amount paid.
    pub fn claim_all_reward(&self, investor: Address, now: u64) -> Result<Amount, OmeaError> {
        let paid = self.mutate("claim", |staged, cfg| ledger::claim_all_reward(staged, cfg, investor, now))?;
        info!(%investor, amount = %paid, "reward claimed");
        Ok(paid)
    }

    /// Grant bonus. Returns the investor's new lifetime bonus.
    pub fn add_bonus(&self, caller: Address, investor: Address, amount: Amount, now: u64) -> Result<Amount, OmeaError> {
        let total = self.mutate("add_bonus", |staged, cfg| {
            ledger::add_bonus(staged, cfg, caller, investor, amount, now)
        })?;
        info!(%investor, amount = %amount, total = %total, "bonus granted");
        Ok(total)
    }

    /// Withdraw principal less the withdrawal fee.
    pub fn withdraw_principal(&self, investor: Address, amount: Amount, now: u64) -> Result<PrincipalSplit, OmeaError> {
        let split = self.mutate("withdraw", |staged, cfg| {
            ledger::withdraw_principal(staged, cfg, investor, amount, now)
        })?;
        info!(%investor, amount = %amount, payout = %split.payout, "principal withdrawn");
        Ok(split)
    }

    pub fn launch(&self, caller: Address) -> Result<(), OmeaError> {
        self.mutate("launch", |staged, cfg| ledger::launch(staged, cfg, caller))?;
        info!(%caller, "protocol launched");
        Ok(())
    }

    /// Stage `op`, then persist, transfer and apply.
    fn mutate<T>(
        &self,
        name: &'static str,
        op: impl FnOnce(&mut Staged<'_>, &EngineConfig) -> Result<Applied<T>, LedgerError>,
    ) -> Result<T, OmeaError> {
        let mut state = self.state.write();

        let mut staged = Staged::new(&state);
        let Applied { value, batch } = match op(&mut staged, &self.config) {
            Ok(applied) => applied,
            Err(e) => {
                debug!(op = name, "rejected: {e}");
                return Err(e.into());
            }
        };
        let changes = staged.into_changes();

        match &self.backend {
            Backend::Settled(store) => {
                if !changes.is_empty() || !batch.is_empty() {
                    if let Err(e) = store.commit_with_transfers(&changes.changeset(), &batch) {
                        warn!(op = name, legs = batch.legs.len(), "settlement rejected: {e}");
                        return Err(e);
                    }
                }
            }
            Backend::Split { store, assets } => {
                if !changes.is_empty() {
                    store.commit(&changes.changeset())?;
                }
                if !batch.is_empty() {
                    if let Err(e) = assets.execute(&batch) {
                        warn!(op = name, legs = batch.legs.len(), "transfer failed: {e}");
                        if !changes.is_empty() {
                            if let Err(undo) = store.commit(&changes.rollback()) {
                                error!(op = name, "rollback failed, store diverges from memory: {undo}");
                                return Err(undo);
                            }
                        }
                        return Err(e.into());
                    }
                }
            }
        }

        state.apply(changes);
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Hourly rate in basis points for a principal of `amount`.
    pub fn get_hpr(&self, amount: Amount) -> u128 {
        hourly_rate_bp(amount)
    }

    /// Rate currently applied to `investor`'s principal.
    pub fn hpr_of(&self, investor: &Address) -> u128 {
        let state = self.state.read();
        hourly_rate_bp(state.investor(investor).map_or(0, |i| i.total_invested))
    }

    /// Settled plus pending reward for `investor` at `now`, excluding bonus.
    pub fn get_claimable_amount(&self, investor: &Address, now: u64) -> Result<Amount, OmeaError> {
        let state = self.state.read();
        Ok(ledger::claimable_at(&state, &self.config, investor, now)?)
    }

    /// Deposit history, oldest first.
    pub fn deposits_of(&self, investor: &Address) -> Vec<Deposit> {
        self.state
            .read()
            .investor(investor)
            .map(|i| i.deposits.clone())
            .unwrap_or_default()
    }

    pub fn investor(&self, address: &Address) -> Option<Investor> {
        self.state.read().investor(address).cloned()
    }

    pub fn referrer_of(&self, investor: &Address) -> Option<Address> {
        referral::referrer_of(&self.state.read(), investor)
    }

    pub fn referral_count(&self, address: &Address) -> u64 {
        referral::referral_count(&self.state.read(), address)
    }

    pub fn investment_info(&self) -> InvestmentInfo {
        self.state.read().protocol().investment_info()
    }

    pub fn protocol_state(&self) -> ProtocolState {
        *self.state.read().protocol()
    }

    pub fn is_launched(&self) -> bool {
        self.state.read().launched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omea_core::asset::{Book, MemoryAssetLedger, TransferBatch};
    use omea_core::constants::{tokens, SECONDS_PER_HOUR};
    use omea_core::error::AssetError;
    use omea_core::store::{Changeset, LedgerSnapshot, MemoryLedgerStore};
    use parking_lot::Mutex;
    use std::thread;

    const HOUR: u64 = SECONDS_PER_HOUR;
    const T0: u64 = 1_700_000_000;

    fn addr(seed: u8) -> Address {
        Address([seed; 20])
    }

    fn admin() -> Address {
        addr(0xA0)
    }

    fn custody() -> Address {
        addr(0xC0)
    }

    struct Fixture {
        engine: Engine,
        store: Arc<MemoryLedgerStore>,
        assets: Arc<MemoryAssetLedger>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let assets = Arc::new(MemoryAssetLedger::new());
        let config = EngineConfig::new(admin(), custody(), addr(0xD0), addr(0xE0));
        let engine = Engine::open(config, store.clone(), assets.clone()).unwrap();
        Fixture { engine, store, assets }
    }

    /// Fund `who` and approve custody to pull it.
    fn fund(f: &Fixture, who: Address, amount: Amount) {
        f.assets.mint(&who, amount).unwrap();
        f.assets.approve(&who, &custody(), amount);
    }

    fn launched() -> Fixture {
        let f = fixture();
        f.engine.launch(admin()).unwrap();
        f
    }

    #[test]
    fn deposit_moves_tokens_and_persists() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        let receipt = f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();

        assert_eq!(receipt.net_principal, tokens(96));
        assert_eq!(f.assets.balance_of(&addr(1)), 0);
        assert_eq!(f.assets.balance_of(&custody()), tokens(96));
        assert_eq!(f.assets.balance_of(&addr(0xD0)), tokens(2));
        assert_eq!(f.assets.balance_of(&addr(0xE0)), tokens(2));

        let stored = f.store.get_investor(&addr(1)).unwrap();
        assert_eq!(Some(stored), f.engine.investor(&addr(1)));
        assert_eq!(
            f.engine.investment_info(),
            InvestmentInfo { total_investors: 1, total_value_locked: tokens(96) }
        );
    }

    #[test]
    fn failed_transfer_rolls_back_everything() {
        let f = launched();
        // No allowance: the pull leg fails.
        f.assets.mint(&addr(1), tokens(100)).unwrap();
        let err = f.engine.deposit(addr(1), tokens(100), Some(addr(2)), T0).unwrap_err();

        assert!(matches!(err, OmeaError::Asset(AssetError::InsufficientAllowance { .. })));
        assert!(f.engine.investor(&addr(1)).is_none());
        assert!(f.engine.investor(&addr(2)).is_none());
        assert!(f.store.get_investor(&addr(1)).is_none());
        assert!(f.store.get_investor(&addr(2)).is_none());
        assert_eq!(f.engine.protocol_state(), ProtocolState::default());
        assert_eq!(f.store.load().unwrap().protocol, ProtocolState::default());
        assert_eq!(f.assets.balance_of(&addr(1)), tokens(100));
    }

    #[test]
    fn failed_claim_payout_restores_record() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        let before = f.engine.investor(&addr(1)).unwrap();

        // Custody holds 96 tokens; a bonus larger than that cannot be paid.
        f.engine.add_bonus(admin(), addr(1), tokens(500), T0).unwrap();
        let with_bonus = f.engine.investor(&addr(1)).unwrap();
        assert_eq!(with_bonus.bonus, tokens(500));

        let err = f.engine.claim_all_reward(addr(1), T0 + HOUR).unwrap_err();
        assert!(matches!(err, OmeaError::Asset(AssetError::InsufficientBalance { .. })));
        assert_eq!(f.engine.investor(&addr(1)).unwrap(), with_bonus);
        assert_eq!(f.store.get_investor(&addr(1)).unwrap(), with_bonus);
        assert_eq!(before.bonus, 0);
    }

    #[test]
    fn rejected_operation_touches_nothing() {
        let f = launched();
        let err = f.engine.deposit(addr(1), 0, None, T0).unwrap_err();
        assert!(matches!(err, OmeaError::Ledger(LedgerError::InvalidAmount)));
        assert!(f.store.get_investor(&addr(1)).is_none());
    }

    #[test]
    fn operations_before_launch_rejected() {
        let f = fixture();
        fund(&f, addr(1), tokens(100));
        assert!(matches!(
            f.engine.deposit(addr(1), tokens(100), None, T0),
            Err(OmeaError::Ledger(LedgerError::NotLaunched))
        ));
        assert!(matches!(
            f.engine.claim_all_reward(addr(1), T0),
            Err(OmeaError::Ledger(LedgerError::NotLaunched))
        ));
        assert!(!f.engine.is_launched());
        f.engine.launch(admin()).unwrap();
        assert!(f.engine.is_launched());
        assert!(f.store.load().unwrap().launched);
    }

    #[test]
    fn claim_round_trip_and_nothing_left() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();

        let expected = tokens(96) * 7 / 10_000;
        assert_eq!(f.engine.get_claimable_amount(&addr(1), T0 + HOUR).unwrap(), expected);
        assert_eq!(f.engine.claim_all_reward(addr(1), T0 + HOUR).unwrap(), expected);
        assert_eq!(f.assets.balance_of(&addr(1)), expected);
        assert_eq!(f.engine.get_claimable_amount(&addr(1), T0 + HOUR).unwrap(), 0);
        assert!(matches!(
            f.engine.claim_all_reward(addr(1), T0 + HOUR),
            Err(OmeaError::Ledger(LedgerError::NothingToClaim))
        ));
    }

    #[test]
    fn hpr_follows_principal() {
        let f = launched();
        assert_eq!(f.engine.get_hpr(tokens(100)), 7);
        assert_eq!(f.engine.get_hpr(tokens(101)), 8);
        assert_eq!(f.engine.hpr_of(&addr(1)), 0);
        fund(&f, addr(1), tokens(200));
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        assert_eq!(f.engine.hpr_of(&addr(1)), 7);
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        assert_eq!(f.engine.hpr_of(&addr(1)), 8);
    }

    #[test]
    fn withdraw_pays_out_less_fee() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        let split = f.engine.withdraw_principal(addr(1), tokens(96), T0).unwrap();
        assert_eq!(split.payout, tokens(96) - tokens(96) / 100);
        assert_eq!(f.assets.balance_of(&addr(1)), split.payout);
        assert_eq!(f.assets.balance_of(&custody()), split.fee);
        assert_eq!(f.engine.investment_info().total_value_locked, 0);
        assert_eq!(f.engine.hpr_of(&addr(1)), 0);
    }

    #[test]
    fn referral_visible_through_engine() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        f.engine.deposit(addr(1), tokens(100), Some(addr(2)), T0).unwrap();
        assert_eq!(f.engine.referrer_of(&addr(1)), Some(addr(2)));
        assert_eq!(f.engine.referral_count(&addr(2)), 1);
    }

    #[test]
    fn deposits_of_lists_history() {
        let f = launched();
        fund(&f, addr(1), tokens(300));
        f.engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        f.engine.deposit(addr(1), tokens(200), None, T0 + 10).unwrap();
        assert_eq!(
            f.engine.deposits_of(&addr(1)),
            vec![
                Deposit { amount: tokens(96), timestamp: T0 },
                Deposit { amount: tokens(192), timestamp: T0 + 10 },
            ]
        );
        assert!(f.engine.deposits_of(&addr(9)).is_empty());
    }

    #[test]
    fn reopen_from_store_restores_state() {
        let f = launched();
        fund(&f, addr(1), tokens(100));
        f.engine.deposit(addr(1), tokens(100), Some(addr(2)), T0).unwrap();

        let snapshot = f.store.load().unwrap();
        let store = Arc::new(MemoryLedgerStore::with_snapshot(snapshot));
        let reopened = Engine::open(f.engine.config().clone(), store, f.assets.clone()).unwrap();
        assert!(reopened.is_launched());
        assert_eq!(reopened.investor(&addr(1)), f.engine.investor(&addr(1)));
        assert_eq!(reopened.investment_info(), f.engine.investment_info());
    }

    /// Store that fails every commit.
    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        fn load(&self) -> Result<LedgerSnapshot, OmeaError> {
            Ok(LedgerSnapshot { launched: true, ..LedgerSnapshot::default() })
        }

        fn commit(&self, _: &Changeset) -> Result<(), OmeaError> {
            Err(OmeaError::Storage("disk full".into()))
        }
    }

    #[test]
    fn storage_failure_moves_no_tokens() {
        let assets = Arc::new(MemoryAssetLedger::new());
        let config = EngineConfig::new(admin(), custody(), addr(0xD0), addr(0xE0));
        let engine = Engine::open(config, Arc::new(BrokenStore), assets.clone()).unwrap();
        assets.mint(&addr(1), tokens(100)).unwrap();
        assets.approve(&addr(1), &custody(), tokens(100));

        let err = engine.deposit(addr(1), tokens(100), None, T0).unwrap_err();
        assert!(matches!(err, OmeaError::Storage(_)));
        assert_eq!(assets.balance_of(&addr(1)), tokens(100));
        assert!(engine.investor(&addr(1)).is_none());
    }

    #[test]
    fn concurrent_deposits_keep_totals_consistent() {
        let f = Arc::new(launched());
        for seed in 1..=8u8 {
            fund(&f, addr(seed), tokens(1_000));
        }

        let handles: Vec<_> = (1..=8u8)
            .map(|seed| {
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    for i in 0..10u64 {
                        f.engine.deposit(addr(seed), tokens(100), None, T0 + i).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let info = f.engine.investment_info();
        assert_eq!(info.total_investors, 8);
        assert_eq!(info.total_value_locked, tokens(96) * 80);
        let sum: Amount = (1..=8u8)
            .map(|s| f.engine.investor(&addr(s)).unwrap().total_invested)
            .sum();
        assert_eq!(sum, info.total_value_locked);
        assert_eq!(f.assets.balance_of(&custody()), info.total_value_locked);
    }

    /// Ledger store and asset book that commit together.
    #[derive(Default)]
    struct SettledMemory {
        store: MemoryLedgerStore,
        book: Mutex<Book>,
        batches: Mutex<Vec<TransferBatch>>,
    }

    impl LedgerStore for SettledMemory {
        fn load(&self) -> Result<LedgerSnapshot, OmeaError> {
            self.store.load()
        }

        fn commit(&self, changes: &Changeset) -> Result<(), OmeaError> {
            self.store.commit(changes)
        }
    }

    impl SettlementStore for SettledMemory {
        fn commit_with_transfers(&self, changes: &Changeset, batch: &TransferBatch) -> Result<(), OmeaError> {
            let mut book = self.book.lock();
            let mut scratch = book.clone();
            scratch.execute(batch)?;
            self.store.commit(changes)?;
            *book = scratch;
            if !batch.is_empty() {
                self.batches.lock().push(batch.clone());
            }
            Ok(())
        }
    }

    fn settled() -> (Engine, Arc<SettledMemory>) {
        let backend = Arc::new(SettledMemory::default());
        let config = EngineConfig::new(admin(), custody(), addr(0xD0), addr(0xE0));
        let engine = Engine::open_settled(config, backend.clone()).unwrap();
        engine.launch(admin()).unwrap();
        (engine, backend)
    }

    #[test]
    fn settled_backend_rejects_unfunded_deposit_atomically() {
        let (engine, backend) = settled();
        let err = engine.deposit(addr(1), tokens(100), Some(addr(2)), T0).unwrap_err();

        assert!(matches!(err, OmeaError::Asset(AssetError::InsufficientAllowance { .. })));
        assert!(engine.investor(&addr(1)).is_none());
        assert!(backend.store.get_investor(&addr(1)).is_none());
        assert!(backend.store.get_investor(&addr(2)).is_none());
        assert_eq!(backend.store.load().unwrap().protocol, ProtocolState::default());
        assert!(backend.batches.lock().is_empty());
    }

    #[test]
    fn settled_backend_commits_change_and_transfers_together() {
        let (engine, backend) = settled();
        {
            let mut book = backend.book.lock();
            book.set_balance(addr(1), tokens(100));
            book.set_allowance(addr(1), custody(), tokens(100));
        }
        engine.deposit(addr(1), tokens(100), None, T0).unwrap();
        assert_eq!(backend.book.lock().balance(&custody()), tokens(96));
        assert_eq!(backend.batches.lock().len(), 1);

        // Custody cannot cover more than it holds.
        engine.add_bonus(admin(), addr(1), tokens(500), T0).unwrap();
        let before = engine.investor(&addr(1)).unwrap();
        let err = engine.claim_all_reward(addr(1), T0 + HOUR).unwrap_err();
        assert!(matches!(err, OmeaError::Asset(AssetError::InsufficientBalance { .. })));
        assert_eq!(engine.investor(&addr(1)).unwrap(), before);
        assert_eq!(backend.store.get_investor(&addr(1)).unwrap(), before);
        assert_eq!(backend.batches.lock().len(), 1);
    }
}
