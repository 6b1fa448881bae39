//! Accrual settlement.
//!
//! Reward accrues on an investor's current net principal at the hourly rate
//! of the tier that principal falls in:
//!
//! ```text
//! reward = total_invested * rate_bp(total_invested) * hours / 10_000
//! ```
//!
//! Settlement folds everything accrued since `last_settled` into
//! `claimable_amount` and moves `last_settled` to `now`. It runs first in
//! every mutating operation, before the operation changes the principal, so
//! each period accrues on the principal that was actually in place during it.
//!
//! All arithmetic is checked `u128`.

use omea_core::constants::{BPS_PRECISION, SECONDS_PER_HOUR};
use omea_core::error::LedgerError;
use omea_core::rate::hourly_rate_bp;
use omea_core::types::{Amount, Investor};

use crate::config::AccrualPolicy;

/// Reward accrued on `principal` over `elapsed_secs` under `policy`.
pub fn accrued_reward(principal: Amount, elapsed_secs: u64, policy: AccrualPolicy) -> Result<Amount, LedgerError> {
    if principal == 0 || elapsed_secs == 0 {
        return Ok(0);
    }
    let rate = hourly_rate_bp(principal);
    let per_period = principal
        .checked_mul(rate)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    match policy {
        AccrualPolicy::HourTruncated => {
            let hours = (elapsed_secs / SECONDS_PER_HOUR) as u128;
            per_period
                .checked_mul(hours)
                .map(|v| v / BPS_PRECISION)
                .ok_or(LedgerError::ArithmeticOverflow)
        }
        AccrualPolicy::ProRata => per_period
            .checked_mul(elapsed_secs as u128)
            .map(|v| v / (BPS_PRECISION * SECONDS_PER_HOUR as u128))
            .ok_or(LedgerError::ArithmeticOverflow),
    }
}

/// Reward that [`settle`] would add at `now`, without mutating anything.
pub fn pending_reward(investor: &Investor, now: u64, policy: AccrualPolicy) -> Result<Amount, LedgerError> {
    let elapsed = now.saturating_sub(investor.last_settled);
    accrued_reward(investor.total_invested, elapsed, policy)
}

/// Fold accrued reward into `claimable_amount` and advance `last_settled`.
///
/// Returns the reward added. Calling twice with the same `now` adds nothing
/// the second time. A `now` before `last_settled` adds nothing and leaves
/// `last_settled` where it is.
pub fn settle(investor: &mut Investor, now: u64, policy: AccrualPolicy) -> Result<Amount, LedgerError> {
    let reward = pending_reward(investor, now, policy)?;
    investor.claimable_amount = investor
        .claimable_amount
        .checked_add(reward)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    investor.last_settled = investor.last_settled.max(now);
    Ok(reward)
}
