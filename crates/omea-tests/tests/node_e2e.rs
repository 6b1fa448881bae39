//! Node-level end-to-end tests over RocksDB and the transfer journal.

use std::sync::Arc;

use omea_core::asset::TransferLeg;
use omea_core::constants::{tokens, SECONDS_PER_HOUR};
use omea_core::traits::Clock;
use omea_core::types::{Address, Amount};
use omea_node_lib::Node;
use omea_tests::helpers::*;

const HOUR: u64 = SECONDS_PER_HOUR;

fn fund(node: &Node, who: Address, amount: Amount) {
    node.credit(ADMIN, who, amount).unwrap();
    node.approve(who, CUSTODY, amount).unwrap();
}

#[test]
fn full_lifecycle_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let (alice, bob) = (addr(1), addr(2));

    {
        let node = Node::with_clock(node_config(dir.path()), clock.clone()).unwrap();
        node.launch(ADMIN).unwrap();
        fund(&node, alice, tokens(1000));
        node.deposit(alice, tokens(1000), Some(bob)).unwrap();
        clock.advance(HOUR);
        node.add_bonus(ADMIN, alice, tokens(4)).unwrap();
        clock.advance(HOUR);
        let paid = node.claim_all_reward(alice).unwrap();
        assert_eq!(paid, 2 * tokens(960) * 10 / 10_000 + tokens(4));
    }

    clock.advance(HOUR);
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let node = Node::with_clock(node_config(dir.path()), clock_dyn).unwrap();
    assert!(node.engine().is_launched());
    assert_eq!(node.engine().referrer_of(&alice), Some(bob));
    assert_eq!(node.engine().referral_count(&bob), 1);
    assert_eq!(node.investment_info().total_value_locked, tokens(960));
    assert_eq!(node.get_claimable_amount(&alice).unwrap(), tokens(960) * 10 / 10_000);
    let paid = 2 * tokens(960) * 10 / 10_000 + tokens(4);
    assert_eq!(node.balance_of(&alice).unwrap(), paid);
    assert_eq!(node.balance_of(&CUSTODY).unwrap(), tokens(960) - paid);

    // Deposit and claim were journaled; the bonus grant moves no tokens.
    let transfers = node.transfers(0, 10).unwrap();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].recorded_at, T0);
    assert_eq!(transfers[1].recorded_at, T0 + 2 * HOUR);
    assert!(matches!(
        transfers[1].batch.legs[0],
        TransferLeg::Push { to, .. } if to == alice
    ));
}

#[test]
fn withdrawal_is_journaled_with_payout() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let node = Node::with_clock(node_config(dir.path()), clock.clone()).unwrap();
    node.launch(ADMIN).unwrap();
    fund(&node, addr(1), tokens(1000));
    node.deposit(addr(1), tokens(1000), None).unwrap();

    let split = node.withdraw_principal(addr(1), tokens(100)).unwrap();
    let last = node.transfers(1, 1).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].batch.legs.len(), 1);
    assert_eq!(last[0].batch.legs[0].amount(), split.payout);
    assert_eq!(node.investor(&addr(1)).unwrap().total_invested, tokens(860));
    assert_eq!(node.balance_of(&addr(1)).unwrap(), split.payout);
}

#[test]
fn rejected_operations_leave_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let node = Node::with_clock(node_config(dir.path()), clock.clone()).unwrap();

    assert!(node.deposit(addr(1), tokens(1000), None).is_err());
    assert!(node.launch(addr(1)).is_err());
    node.launch(ADMIN).unwrap();
    assert!(node.claim_all_reward(addr(1)).is_err());
    assert!(node.withdraw_principal(addr(1), 1).is_err());
    node.credit(ADMIN, addr(1), tokens(1000)).unwrap();
    assert!(node.deposit(addr(1), tokens(1000), None).is_err());
    assert_eq!(node.balance_of(&addr(1)).unwrap(), tokens(1000));

    assert!(node.transfers(0, 10).unwrap().is_empty());
    assert!(node.investor(&addr(1)).is_none());
}
