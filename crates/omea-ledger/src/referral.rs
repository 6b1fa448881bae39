//! Referral graph.
//!
//! Edges live on the investor records themselves: `referrer` on the referee
//! and `referral_count` on the referrer. An edge is written once, on the
//! referee's first deposit, and never rewritten. Cycles can still form:
//! if A's first deposit names B, B gets a record with no referrer, and B's
//! own first deposit may then name A. Nothing walks the graph, so a cycle
//! only means each side counts the other once.

use omea_core::error::ReferralError;
use omea_core::types::Address;

use crate::ledger::{LedgerState, Staged};

/// Record `referrer` as the referrer of `investor` and credit the referrer.
///
/// The referrer's record is created if the address has never interacted
/// with the protocol.
pub fn link(staged: &mut Staged<'_>, investor: Address, referrer: Address) -> Result<(), ReferralError> {
    if investor == referrer {
        return Err(ReferralError::SelfReferral);
    }
    if staged.investor(&investor).is_some_and(|i| i.referrer.is_some()) {
        return Err(ReferralError::AlreadyReferred);
    }
    staged.investor_mut(investor).referrer = Some(referrer);
    let record = staged.investor_mut(referrer);
    record.referral_count = record.referral_count.saturating_add(1);
    Ok(())
}

pub fn referrer_of(state: &LedgerState, investor: &Address) -> Option<Address> {
    state.investor(investor).and_then(|i| i.referrer)
}

pub fn referral_count(state: &LedgerState, address: &Address) -> u64 {
    state.investor(address).map_or(0, |i| i.referral_count)
}
