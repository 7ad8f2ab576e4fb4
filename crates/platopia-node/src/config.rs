//! Node configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Args;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name.
    pub node_name: String,
    /// Network (main, test, regtest).
    pub network: String,
    /// API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Mining configuration.
    #[serde(default)]
    pub mining: MiningConfig,
}

/// API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API bind address.
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:41320".to_string(),
        }
    }
}

/// Mining configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Start the mining coordinator at boot.
    pub enabled: bool,
    /// Worker threads; negative selects the network default or the
    /// hardware concurrency.
    #[serde(default = "default_threads")]
    pub threads: i32,
    /// Coinbase output script, hex.
    pub coinbase_script: Option<String>,
    /// Cap on generated block size in bytes.
    #[serde(default = "default_block_max_size")]
    pub block_max_size: u64,
    /// Minimum package fee rate per kB for block inclusion.
    #[serde(default = "default_block_min_tx_fee")]
    pub block_min_tx_fee: i64,
    /// Percent of the block reserved for priority transactions.
    #[serde(default = "default_priority_percentage")]
    pub block_priority_percentage: u8,
    /// Keep the DAG pre-generator running.
    #[serde(default = "default_true")]
    pub pregenerate_dag: bool,
}

fn default_threads() -> i32 {
    -1
}

fn default_block_max_size() -> u64 {
    platopia_consensus::DEFAULT_MAX_GENERATED_BLOCK_SIZE
}

fn default_block_min_tx_fee() -> i64 {
    platopia_consensus::DEFAULT_BLOCK_MIN_TX_FEE
}

fn default_priority_percentage() -> u8 {
    platopia_consensus::DEFAULT_BLOCK_PRIORITY_PERCENTAGE
}

fn default_true() -> bool {
    true
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threads: default_threads(),
            coinbase_script: None,
            block_max_size: default_block_max_size(),
            block_min_tx_fee: default_block_min_tx_fee(),
            block_priority_percentage: default_priority_percentage(),
            pregenerate_dag: default_true(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and override with CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default_for_network(&args.network)
        };

        config.network = args.network.clone();

        if let Some(ref api_bind) = args.api_bind {
            config.api.bind_address = api_bind.clone();
        }
        if args.mining {
            config.mining.enabled = true;
        }
        if let Some(threads) = args.mining_threads {
            config.mining.threads = threads;
        }
        if let Some(ref script) = args.mining_script {
            config.mining.coinbase_script = Some(script.clone());
        }

        Ok(config)
    }

    /// Default configuration for a network.
    pub fn default_for_network(network: &str) -> Self {
        Self {
            node_name: "platopia-node".to_string(),
            network: network.to_string(),
            api: ApiConfig::default(),
            mining: MiningConfig::default(),
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
