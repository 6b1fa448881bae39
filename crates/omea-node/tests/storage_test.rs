//! Persistence tests for the RocksDB store and the node built on it.

use std::sync::Arc;

use omea_core::constants::{tokens, SECONDS_PER_HOUR};
use omea_core::traits::{FixedClock, LedgerStore};
use omea_core::types::Address;
use omea_ledger::EngineConfig;
use omea_node_lib::storage::RocksStore;
use omea_node_lib::{Node, NodeConfig};

const T0: u64 = 1_700_000_000;

fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

fn config(dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        data_dir: dir.to_path_buf(),
        engine: EngineConfig::new(addr(0xA0), addr(0xC0), addr(0xD0), addr(0xE0)),
        ..NodeConfig::default()
    }
}

fn open(dir: &std::path::Path, now: u64) -> Arc<Node> {
    Node::with_clock(config(dir), Arc::new(FixedClock(now))).unwrap()
}

/// Credit `who` and approve custody to pull the full amount, then deposit it.
fn fund_and_deposit(node: &Node, who: Address, gross: u128, referrer: Option<Address>) {
    node.credit(addr(0xA0), who, gross).unwrap();
    node.approve(who, addr(0xC0), gross).unwrap();
    node.deposit(who, gross, referrer).unwrap();
}

#[test]
fn ledger_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let node = open(dir.path(), T0);
        node.launch(addr(0xA0)).unwrap();
        fund_and_deposit(&node, addr(1), tokens(100), Some(addr(2)));
        fund_and_deposit(&node, addr(3), tokens(1_000), None);
        node.add_bonus(addr(0xA0), addr(1), tokens(4)).unwrap();
    }

    let node = open(dir.path(), T0 + SECONDS_PER_HOUR);
    assert!(node.engine().is_launched());
    let info = node.investment_info();
    assert_eq!(info.total_investors, 2);
    assert_eq!(info.total_value_locked, tokens(96) + tokens(960));

    let alice = node.investor(&addr(1)).unwrap();
    assert_eq!(alice.referrer, Some(addr(2)));
    assert_eq!(alice.bonus, tokens(4));
    assert_eq!(node.engine().referral_count(&addr(2)), 1);

    // One hour at 7 bp on 96 tokens; the bonus is paid on claim.
    let claimable = node.get_claimable_amount(&addr(1)).unwrap();
    assert_eq!(claimable, tokens(96) * 7 / 10_000);
    let paid = node.claim_all_reward(addr(1)).unwrap();
    assert_eq!(paid, claimable + tokens(4));
    assert_eq!(node.balance_of(&addr(1)).unwrap(), paid);
}

#[test]
fn claim_after_reopen_continues_accrual() {
    let dir = tempfile::tempdir().unwrap();
    {
        let node = open(dir.path(), T0);
        node.launch(addr(0xA0)).unwrap();
        fund_and_deposit(&node, addr(1), tokens(100), None);
    }
    {
        let node = open(dir.path(), T0 + 2 * SECONDS_PER_HOUR);
        let paid = node.claim_all_reward(addr(1)).unwrap();
        assert_eq!(paid, tokens(96) * 7 * 2 / 10_000);
    }
    let node = open(dir.path(), T0 + 2 * SECONDS_PER_HOUR);
    assert_eq!(node.get_claimable_amount(&addr(1)).unwrap(), 0);
    assert_eq!(node.investor(&addr(1)).unwrap().total_claimed, tokens(96) * 7 * 2 / 10_000);
    assert_eq!(node.transfers(0, 10).unwrap().len(), 2);
}

#[test]
fn raw_store_matches_engine_view() {
    let dir = tempfile::tempdir().unwrap();
    {
        let node = open(dir.path(), T0);
        node.launch(addr(0xA0)).unwrap();
        fund_and_deposit(&node, addr(1), tokens(100), None);
    }
    let store = RocksStore::open(config(dir.path()).db_path()).unwrap();
    let snapshot = store.load().unwrap();
    assert!(snapshot.launched);
    assert_eq!(snapshot.protocol.total_value_locked, tokens(96));
    assert_eq!(store.investor_count().unwrap(), 1);
    assert_eq!(store.next_transfer_seq().unwrap(), 1);
    assert_eq!(store.balance_of(&addr(0xC0)).unwrap(), tokens(96));
    assert_eq!(store.allowance(&addr(1), &addr(0xC0)).unwrap(), 0);
}
