//! CLI settings.
//!
//! Resolution order: built-in defaults, then the TOML file
//! (`~/.modelrep/config.toml` or `--config`), then `MODELREP_*` environment
//! variables, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use modelrep_chain::{get_network, NetworkConfig, NETWORKS};
use modelrep_engine::{AggregatorConfig, OrchestratorConfig, DEFAULT_BATCH_SIZE};
use serde::Deserialize;

pub const ENV_RPC_URL: &str = "MODELREP_RPC_URL";
pub const ENV_API_URL: &str = "MODELREP_API_URL";
pub const ENV_PRIVATE_KEY: &str = "MODELREP_PRIVATE_KEY";
pub const ENV_CONTRACT: &str = "MODELREP_CONTRACT";

const DEFAULT_NETWORK: &str = "base-sepolia";
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub network: String,
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub api_url: String,
    pub batch_size: usize,
    pub settle_delay_secs: u64,
    pub confirmation_timeout_secs: u64,
    /// Only from the environment.
    #[serde(skip)]
    pub private_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            rpc_url: None,
            contract_address: None,
            api_url: DEFAULT_API_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            settle_delay_secs: 3,
            confirmation_timeout_secs: 120,
            private_key: None,
        }
    }
}

impl Settings {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".modelrep").join("config.toml"))
    }

    /// Load settings from `path` (must exist) or the default location (optional).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_RPC_URL) {
            self.rpc_url = Some(url);
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(address) = non_empty(ENV_CONTRACT) {
            self.contract_address = Some(address);
        }
        if let Some(key) = non_empty(ENV_PRIVATE_KEY) {
            self.private_key = Some(key);
        }
    }

    /// Network config for the active network with overrides applied.
    pub fn network_config(&self) -> Result<NetworkConfig> {
        let known = get_network(&self.network).ok_or_else(|| {
            anyhow!(
                "Unknown network '{}'. Known networks: {}",
                self.network,
                NETWORKS.iter().map(|n| n.name).collect::<Vec<_>>().join(", ")
            )
        })?;

        let mut config = known.to_config();
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(address) = &self.contract_address {
            config.contract_address = Some(
                address
                    .parse()
                    .map_err(|_| anyhow!("Invalid contract address '{}'", address))?,
            );
        }
        if config.rpc_url.is_empty() {
            bail!("No RPC URL for network '{}'", config.name);
        }
        Ok(config)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig::with_batch_size(self.batch_size)
    }

    pub fn orchestrator_config(&self, network: &NetworkConfig) -> OrchestratorConfig {
        OrchestratorConfig::for_network(network)
            .with_settle_delay(Duration::from_secs(self.settle_delay_secs))
            .with_confirmation_timeout(Duration::from_secs(self.confirmation_timeout_secs))
    }
}
