//! Node configuration for the OMEA node.
//!
//! [`NodeConfig`] is assembled in layers: built-in defaults, then an
//! optional TOML file, then `OMEA_*` environment variables. Command-line
//! flags are applied on top by the binary. Nested engine settings use a
//! double underscore in the environment, e.g. `OMEA_ENGINE__ADMIN`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use omea_core::constants::DEFAULT_RPC_PORT;
use omea_core::error::OmeaError;
use omea_ledger::EngineConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "OMEA";

/// Configuration for a node instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "omea_ledger=trace").
    pub log_level: String,
    /// Log output format: "text" or "json".
    pub log_format: String,
    /// Accounting engine settings.
    pub engine: EngineConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("omea");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `file` if given, then the environment.
    ///
    /// A missing file is an error only when a path was given explicitly.
    pub fn load(file: Option<&Path>) -> Result<Self, OmeaError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| OmeaError::Config(e.to_string()))
    }

    /// Path to the RocksDB ledger directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}
