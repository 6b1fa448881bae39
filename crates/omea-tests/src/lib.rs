//! Cross-crate test suite for OMEA.
//!
//! Scenario tests walk the engine through the deposit, bonus, claim and
//! withdrawal flows end to end; invariant tests drive it with randomized
//! operation sequences and check the ledger-wide properties after each step.

pub mod helpers;
