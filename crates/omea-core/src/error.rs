//! Error types for the OMEA protocol.
use thiserror::Error;

use crate::types::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be greater than zero")] InvalidAmount,
    #[error("protocol has not been launched")] NotLaunched,
    #[error("protocol already launched")] AlreadyLaunched,
    #[error("caller is not the administrator")] Unauthorized,
    #[error("bonus limit reached: current {current}, requested {requested}, limit {limit}")] BonusLimitExceeded { current: Amount, requested: Amount, limit: Amount },
    #[error("nothing to claim")] NothingToClaim,
    #[error("insufficient principal: have {have}, need {need}")] InsufficientPrincipal { have: Amount, need: Amount },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferralError {
    #[error("investor cannot refer themselves")] SelfReferral,
    #[error("referrer already set")] AlreadyReferred,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient balance for {owner}: have {have}, need {need}")] InsufficientBalance { owner: String, have: Amount, need: Amount },
    #[error("insufficient allowance from {owner}: have {have}, need {need}")] InsufficientAllowance { owner: String, have: Amount, need: Amount },
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid length: expected 40 hex characters, got {0}")] InvalidLength(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
}

#[derive(Error, Debug)]
pub enum OmeaError {
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Referral(#[from] ReferralError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error("storage: {0}")] Storage(String),
    #[error("config: {0}")] Config(String),
}
