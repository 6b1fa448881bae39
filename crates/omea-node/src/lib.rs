//! # omea-node-lib: Node: RocksDB, transfer journal, RPC, orchestration.
//!
//! Composes the OMEA engine into a running node:
//! - [`storage::RocksStore`]: persistent ledger state backed by RocksDB
//! - [`journal::JournalLedger`]: asset book and transfer journal, settled atomically
//! - [`node::Node`]: wires storage, journal and clock into the engine
//! - [`rpc`]: JSON-RPC server for external access
//! - [`config::NodeConfig`]: layered node configuration

pub mod config;
pub mod journal;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
