//! Shared test helpers for scenario and invariant tests.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use omea_core::asset::MemoryAssetLedger;
use omea_core::store::MemoryLedgerStore;
use omea_core::traits::Clock;
use omea_core::types::{Address, Amount};
use omea_ledger::{Engine, EngineConfig};
use omea_node_lib::NodeConfig;

/// Start of every scenario clock.
pub const T0: u64 = 1_700_000_000;

pub const ADMIN: Address = Address([0xA0; 20]);
pub const CUSTODY: Address = Address([0xC0; 20]);
pub const DEV_WALLET: Address = Address([0xD0; 20]);
pub const MARKETING_WALLET: Address = Address([0xE0; 20]);

/// Simple address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

/// The configuration every scenario starts from.
pub fn config() -> EngineConfig {
    EngineConfig::new(ADMIN, CUSTODY, DEV_WALLET, MARKETING_WALLET)
}

/// An engine over in-memory collaborators.
pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryLedgerStore>,
    pub assets: Arc<MemoryAssetLedger>,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let assets = Arc::new(MemoryAssetLedger::new());
        let engine = Engine::open(config, store.clone(), assets.clone()).unwrap();
        Self { engine, store, assets }
    }

    /// A launched engine with the default configuration.
    pub fn launched() -> Self {
        let h = Self::new(config());
        h.engine.launch(ADMIN).unwrap();
        h
    }

    /// Mint `amount` to `who` and approve custody to pull all of it.
    pub fn fund(&self, who: Address, amount: Amount) {
        self.assets.mint(&who, amount).unwrap();
        let allowance = self.assets.allowance(&who, &CUSTODY);
        self.assets.approve(&who, &CUSTODY, allowance + amount);
    }

    /// Fund `who` with exactly `gross` and deposit it.
    pub fn fund_and_deposit(&self, who: Address, gross: Amount, referrer: Option<Address>, now: u64) -> Amount {
        self.fund(who, gross);
        self.engine.deposit(who, gross, referrer, now).unwrap().net_principal
    }
}

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(start)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Node configuration rooted at `dir` with the scenario engine settings.
pub fn node_config(dir: &Path) -> NodeConfig {
    NodeConfig {
        data_dir: dir.to_path_buf(),
        engine: config(),
        ..NodeConfig::default()
    }
}
