//! Deposit and withdrawal fee math.
//!
//! Fees are computed with truncating integer division, so rounding always
//! favours the depositor's principal and no base unit is lost: the three
//! parts of a deposit split sum back to the gross amount exactly.

use crate::constants::{BPS_PRECISION, DEV_FEE_BP, MARKETING_FEE_BP, PRINCIPAL_FEE_BP};
use crate::error::LedgerError;
use crate::types::Amount;

/// A gross deposit broken into its fee legs and the credited principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSplit {
    pub dev_fee: Amount,
    pub marketing_fee: Amount,
    pub net_principal: Amount,
}

/// A principal withdrawal broken into the retained fee and the payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrincipalSplit {
    pub fee: Amount,
    pub payout: Amount,
}

/// `amount * bp / BPS_PRECISION`, truncating.
pub fn bps_of(amount: Amount, bp: u128) -> Result<Amount, LedgerError> {
    amount
        .checked_mul(bp)
        .map(|v| v / BPS_PRECISION)
        .ok_or(LedgerError::ArithmeticOverflow)
}

/// Split a gross deposit into dev fee, marketing fee and net principal.
///
/// # Examples
///
/// ```
/// use omea_core::constants::tokens;
/// use omea_core::fees::split_deposit;
/// let split = split_deposit(tokens(100)).unwrap();
/// assert_eq!(split.net_principal, tokens(96));
/// ```
pub fn split_deposit(gross: Amount) -> Result<FeeSplit, LedgerError> {
    let dev_fee = bps_of(gross, DEV_FEE_BP)?;
    let marketing_fee = bps_of(gross, MARKETING_FEE_BP)?;
    // Each fee is at most 2% of gross, so the subtraction cannot underflow.
    let net_principal = gross - dev_fee - marketing_fee;
    Ok(FeeSplit {
        dev_fee,
        marketing_fee,
        net_principal,
    })
}

/// Apply the withdrawal fee to an amount of principal.
pub fn split_principal(amount: Amount) -> Result<PrincipalSplit, LedgerError> {
    let fee = bps_of(amount, PRINCIPAL_FEE_BP)?;
    Ok(PrincipalSplit {
        fee,
        payout: amount - fee,
    })
}
