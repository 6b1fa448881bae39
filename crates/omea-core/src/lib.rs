//! # omea-core
//! Foundation types, fee and rate math, and collaborator traits for OMEA.

pub mod asset;
pub mod constants;
pub mod error;
pub mod fees;
pub mod rate;
pub mod store;
pub mod traits;
pub mod types;
