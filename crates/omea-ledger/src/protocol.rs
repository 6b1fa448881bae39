//! Protocol-wide counters.
//!
//! Each function mirrors one ledger mutation and is called in the same
//! staged unit as that mutation, so the counters can never drift from the
//! investor records.

use omea_core::error::LedgerError;
use omea_core::types::{Amount, ProtocolState};

pub fn record_deposit(state: &mut ProtocolState, first_deposit: bool, net: Amount) -> Result<(), LedgerError> {
    if first_deposit {
        state.total_investors = state
            .total_investors
            .checked_add(1)
            .ok_or(LedgerError::ArithmeticOverflow)?;
    }
    state.total_value_locked = state
        .total_value_locked
        .checked_add(net)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(())
}

pub fn record_claim(state: &mut ProtocolState, claimed: Amount) -> Result<(), LedgerError> {
    state.total_rewards_claimed = state
        .total_rewards_claimed
        .checked_add(claimed)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(())
}

pub fn record_bonus(state: &mut ProtocolState, granted: Amount) -> Result<(), LedgerError> {
    state.total_bonus_granted = state
        .total_bonus_granted
        .checked_add(granted)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(())
}

/// Withdrawn principal leaves the locked value; the investor still counts.
pub fn record_withdrawal(state: &mut ProtocolState, principal: Amount) -> Result<(), LedgerError> {
    state.total_value_locked = state
        .total_value_locked
        .checked_sub(principal)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(())
}
