//! CLI command implementations.

pub mod network;
pub mod ranking;
pub mod rate;
pub mod reviews;

use std::sync::Arc;

use anyhow::{Context, Result};
use ethers_core::types::Address;
use modelrep_chain::{ChainClient, EthersChainClient, NetworkConfig};
use modelrep_core::Model;
use modelrep_offchain::{HttpOffchainStore, OffchainStore};

use crate::config::Settings;

/// Ledger client for the active network, with the configured signer if any.
pub(crate) fn chain_client(settings: &Settings, network: &NetworkConfig) -> Result<Arc<EthersChainClient>> {
    let client = EthersChainClient::new(network).context("Failed to create ledger client")?;
    let client = match &settings.private_key {
        Some(key) => client.with_signer(key).context("Failed to load signer")?,
        None => client,
    };
    Ok(Arc::new(client))
}

pub(crate) fn review_store(settings: &Settings) -> Result<Arc<HttpOffchainStore>> {
    let store = HttpOffchainStore::new(&settings.api_url).context("Failed to create review API client")?;
    Ok(Arc::new(store))
}

/// Explicit `--address`, else the signer's account.
pub(crate) fn caller(address: Option<&str>, chain: &EthersChainClient) -> Result<Option<Address>> {
    match address {
        Some(a) => Ok(Some(
            a.parse().with_context(|| format!("Invalid address '{}'", a))?,
        )),
        None => Ok(chain.account()),
    }
}

pub(crate) async fn find_model(store: &dyn OffchainStore, model_id: u64) -> Result<Model> {
    let models = store.list_models().await.context("Failed to load model catalog")?;
    models
        .into_iter()
        .find(|m| m.id == model_id)
        .with_context(|| format!("Unknown model id {}", model_id))
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
