//! Hourly reward-rate schedule.
//!
//! The rate an investor earns is selected by the size of their net principal.
//! Tier bounds are in whole tokens and inclusive on the upper end:
//!
//! | principal (tokens) | rate (bp / hour) |
//! |--------------------|------------------|
//! | 0                  | 0                |
//! | (0, 100]           | 7                |
//! | (100, 500]         | 8                |
//! | (500, 1000]        | 10               |
//! | (1000, 5000]       | 12               |
//! | (5000, ∞)          | 15               |
//!
//! Bounds are compared in base units, so 100 tokens plus one base unit is
//! already in the second tier.

use crate::constants::TOKEN;
use crate::types::Amount;

/// One row of the rate table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateTier {
    /// Inclusive upper bound in whole tokens. `None` for the open-ended top tier.
    pub upper_tokens: Option<u128>,
    /// Reward rate in basis points per elapsed hour.
    pub rate_bp: u128,
}

/// Rate tiers for non-zero principal, in ascending order.
pub const RATE_TIERS: &[RateTier] = &[
    RateTier { upper_tokens: Some(100), rate_bp: 7 },
    RateTier { upper_tokens: Some(500), rate_bp: 8 },
    RateTier { upper_tokens: Some(1_000), rate_bp: 10 },
    RateTier { upper_tokens: Some(5_000), rate_bp: 12 },
    RateTier { upper_tokens: Some(6_000), rate_bp: 15 },
    RateTier { upper_tokens: None, rate_bp: 15 },
];

/// Hourly rate in basis points for a principal of `amount` base units.
///
/// # Examples
///
/// ```
/// use omea_core::constants::tokens;
/// use omea_core::rate::hourly_rate_bp;
/// assert_eq!(hourly_rate_bp(0), 0);
/// assert_eq!(hourly_rate_bp(tokens(100)), 7);
/// assert_eq!(hourly_rate_bp(tokens(101)), 8);
/// ```
pub fn hourly_rate_bp(amount: Amount) -> u128 {
    if amount == 0 {
        return 0;
    }
    for tier in RATE_TIERS {
        match tier.upper_tokens {
            // Bounds that overflow u128 in base units can never be exceeded.
            Some(upper) => match upper.checked_mul(TOKEN) {
                Some(bound) if amount > bound => continue,
                _ => return tier.rate_bp,
            },
            None => return tier.rate_bp,
        }
    }
    0
}
