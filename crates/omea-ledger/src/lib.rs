//! # omea-ledger: Time-weighted yield and referral accounting.
//!
//! Builds the OMEA accounting rules on top of `omea-core`:
//! - [`settlement`]: hourly reward accrual on net principal
//! - [`ledger`]: deposits, claims, bonus grants and principal withdrawal,
//!   staged copy-on-write so every rejection is atomic
//! - [`referral`]: the write-once referrer graph
//! - [`protocol`]: protocol-wide counters
//! - [`engine::Engine`]: the serialized engine that persists, transfers and
//!   applies each staged mutation
//! - [`config::EngineConfig`]: privileged addresses and policy knobs

pub mod config;
pub mod engine;
pub mod ledger;
pub mod protocol;
pub mod referral;
pub mod settlement;

pub use config::{AccrualPolicy, BonusCeiling, EngineConfig};
pub use engine::Engine;
pub use ledger::DepositReceipt;
