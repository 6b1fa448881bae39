//! Protocol constants. All monetary values are in base units (1 token = 10^18 base units).

/// Number of decimal places of the deposited asset.
pub const DECIMALS: u32 = 18;

/// One whole token in base units.
pub const TOKEN: u128 = 10u128.pow(DECIMALS);

/// Basis-point denominator used for fees and rates (10_000 bp = 100%).
pub const BPS_PRECISION: u128 = 10_000;

/// Developer fee taken from every deposit, in basis points (2%).
pub const DEV_FEE_BP: u128 = 200;

/// Marketing fee taken from every deposit, in basis points (2%).
pub const MARKETING_FEE_BP: u128 = 200;

/// Fee deducted from withdrawn principal, in basis points (1%).
pub const PRINCIPAL_FEE_BP: u128 = 100;

/// Length of one accrual period.
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Default per-investor bonus ceiling: 1000 tokens.
pub const DEFAULT_BONUS_LIMIT: u128 = 1_000 * TOKEN;

/// Default TCP port for the JSON-RPC server.
pub const DEFAULT_RPC_PORT: u16 = 17_420;

/// Convert a whole-token count into base units.
///
/// # Examples
///
/// ```
/// use omea_core::constants::{tokens, TOKEN};
/// assert_eq!(tokens(100), 100 * TOKEN);
/// ```
pub const fn tokens(whole: u128) -> u128 {
    whole * TOKEN
}
