//! Core protocol types: addresses, deposits, investor records, protocol counters.
//!
//! All monetary values are in base units (see [`TOKEN`](crate::constants::TOKEN)).
//! Timestamps are Unix seconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressError;

/// Unsigned fixed-point amount in base units.
pub type Amount = u128;

/// A 20-byte account identifier.
///
/// Rendered as `0x`-prefixed lowercase hex. Serializes as that string in
/// JSON and TOML so configuration files and RPC payloads stay readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, bincode::Encode, bincode::Decode)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != 40 {
            return Err(AddressError::InvalidLength(digits.len()));
        }
        let bytes = hex::decode(digits).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single recorded deposit. Immutable once recorded.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Deposit {
    /// Net principal credited (gross minus deposit fees).
    pub amount: Amount,
    /// Unix timestamp of the deposit.
    pub timestamp: u64,
}

/// Per-address ledger record.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Investor {
    /// Principal currently accruing, net of deposit fees and withdrawals.
    pub total_invested: Amount,
    /// Settled but unclaimed reward.
    pub claimable_amount: Amount,
    /// Lifetime bonus granted. Never decreases.
    pub bonus: Amount,
    /// Portion of `bonus` already paid out by a claim.
    pub bonus_claimed: Amount,
    /// Lifetime rewards and bonus paid out.
    pub total_claimed: Amount,
    /// Lifetime principal withdrawn, before the withdrawal fee.
    pub total_withdrawn: Amount,
    /// Address that referred this investor. Set at most once.
    pub referrer: Option<Address>,
    /// Number of investors this address has referred.
    pub referral_count: u64,
    /// Deposit history in insertion order.
    pub deposits: Vec<Deposit>,
    /// Timestamp of the last accrual settlement.
    pub last_settled: u64,
}

impl Investor {
    /// Whether this address has made at least one deposit.
    pub fn has_deposited(&self) -> bool {
        !self.deposits.is_empty()
    }

    /// Bonus granted but not yet paid out.
    pub fn unclaimed_bonus(&self) -> Amount {
        self.bonus.saturating_sub(self.bonus_claimed)
    }
}

/// Aggregate protocol counters, updated alongside every ledger mutation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ProtocolState {
    /// Distinct addresses with at least one deposit.
    pub total_investors: u64,
    /// Sum of every investor's `total_invested`.
    pub total_value_locked: Amount,
    /// Lifetime rewards and bonus paid out.
    pub total_rewards_claimed: Amount,
    /// Lifetime bonus granted by the administrator.
    pub total_bonus_granted: Amount,
}

impl ProtocolState {
    /// The public investment summary.
    pub fn investment_info(&self) -> InvestmentInfo {
        InvestmentInfo {
            total_investors: self.total_investors,
            total_value_locked: self.total_value_locked,
        }
    }
}

/// Summary returned by `getInvestmentInfo`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvestmentInfo {
    pub total_investors: u64,
    pub total_value_locked: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> Address {
        Address([seed; 20])
    }

    #[test]
    fn address_display_is_prefixed_hex() {
        assert_eq!(
            addr(0xAB).to_string(),
            "0xabababababababababababababababababababab"
        );
    }

    #[test]
    fn address_parses_with_and_without_prefix() {
        let a = addr(0x12);
        let s = a.to_string();
        assert_eq!(s.parse::<Address>().unwrap(), a);
        assert_eq!(s.trim_start_matches("0x").parse::<Address>().unwrap(), a);
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert_eq!(
            "0x1234".parse::<Address>().unwrap_err(),
            AddressError::InvalidLength(4)
        );
    }

    #[test]
    fn address_rejects_bad_hex() {
        let s = "0xzz".to_string() + &"00".repeat(19);
        assert!(matches!(
            s.parse::<Address>().unwrap_err(),
            AddressError::InvalidHex(_)
        ));
    }

    #[test]
    fn address_json_is_string() {
        let json = serde_json::to_string(&addr(1)).unwrap();
        assert_eq!(json, format!("\"{}\"", addr(1)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr(1));
    }

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!addr(1).is_zero());
    }

    #[test]
    fn fresh_investor_has_not_deposited() {
        let inv = Investor::default();
        assert!(!inv.has_deposited());
        assert_eq!(inv.unclaimed_bonus(), 0);
        assert!(inv.referrer.is_none());
    }

    #[test]
    fn unclaimed_bonus_subtracts_claimed() {
        let inv = Investor {
            bonus: 10,
            bonus_claimed: 4,
            ..Investor::default()
        };
        assert_eq!(inv.unclaimed_bonus(), 6);
    }

    #[test]
    fn investor_bincode_roundtrip() {
        let inv = Investor {
            total_invested: 96,
            referrer: Some(addr(7)),
            deposits: vec![Deposit { amount: 96, timestamp: 1_000 }],
            last_settled: 1_000,
            ..Investor::default()
        };
        let bytes = bincode::encode_to_vec(&inv, bincode::config::standard()).unwrap();
        let (decoded, _): (Investor, _) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded, inv);
    }

    #[test]
    fn investment_info_projects_counters() {
        let state = ProtocolState {
            total_investors: 3,
            total_value_locked: 500,
            total_rewards_claimed: 9,
            total_bonus_granted: 1,
        };
        let info = state.investment_info();
        assert_eq!(info.total_investors, 3);
        assert_eq!(info.total_value_locked, 500);
    }
}
