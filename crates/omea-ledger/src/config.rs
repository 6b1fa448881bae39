//! Engine configuration: privileged addresses, fee wallets, bonus ceiling
//! and accrual policy.

use serde::{Deserialize, Serialize};

use omea_core::constants::{DEFAULT_BONUS_LIMIT, TOKEN};
use omea_core::error::LedgerError;
use omea_core::types::{Address, Amount};

/// How elapsed time is turned into reward.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccrualPolicy {
    /// Reward per whole elapsed hour; partial hours earn nothing.
    #[default]
    HourTruncated,
    /// Reward pro-rated to the second.
    ProRata,
}

/// Per-investor cap on lifetime bonus.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BonusCeiling {
    /// Cap in whole tokens.
    pub limit_tokens: u64,
    /// Whether a bonus total exactly equal to the cap is allowed.
    pub inclusive: bool,
}

impl Default for BonusCeiling {
    fn default() -> Self {
        Self {
            limit_tokens: (DEFAULT_BONUS_LIMIT / TOKEN) as u64,
            inclusive: false,
        }
    }
}

impl BonusCeiling {
    /// The cap in base units.
    pub fn limit(&self) -> Amount {
        self.limit_tokens as Amount * TOKEN
    }

    /// Validate a grant of `requested` on top of `current`, returning the new total.
    pub fn check(&self, current: Amount, requested: Amount) -> Result<Amount, LedgerError> {
        let limit = self.limit();
        let exceeded = || LedgerError::BonusLimitExceeded {
            current,
            requested,
            limit,
        };
        let total = current.checked_add(requested).ok_or_else(exceeded)?;
        let within = if self.inclusive {
            total <= limit
        } else {
            total < limit
        };
        if within { Ok(total) } else { Err(exceeded()) }
    }
}

/// Static configuration of an [`Engine`](crate::engine::Engine).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Only address allowed to launch the protocol and grant bonus.
    pub admin: Address,
    /// Account holding deposited principal on the asset ledger.
    pub custody: Address,
    /// Receives the developer share of deposit fees.
    pub dev_wallet: Address,
    /// Receives the marketing share of deposit fees.
    pub marketing_wallet: Address,
    pub bonus_ceiling: BonusCeiling,
    pub accrual: AccrualPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: Address::ZERO,
            custody: Address::ZERO,
            dev_wallet: Address::ZERO,
            marketing_wallet: Address::ZERO,
            bonus_ceiling: BonusCeiling::default(),
            accrual: AccrualPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with the given privileged addresses and default policies.
    pub fn new(admin: Address, custody: Address, dev_wallet: Address, marketing_wallet: Address) -> Self {
        Self {
            admin,
            custody,
            dev_wallet,
            marketing_wallet,
            ..Self::default()
        }
    }
}
