//! JSON-RPC client for the rating contract.
//!
//! Wraps `ethers::providers::Provider` for reads and a `LocalWallet` behind
//! `SignerMiddleware` for writes. Reads retry transient failures with
//! exponential backoff and jitter.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi};
use ethers::contract::Contract;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256, U64};
use modelrep_core::{ReputationSnapshot, Score};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::client::{ChainClient, LedgerReader, TxStatus};
use crate::error::{ChainError, Result};
use crate::network::NetworkConfig;

/// Human-readable ABI of the rating contract.
pub const RATING_CONTRACT_ABI: &[&str] = &[
    "function rateModel(uint256 modelId, uint8 score)",
    "function getReputation(uint256 modelId) view returns (uint256 averageScore, uint256 totalRatings)",
    "function getUserRating(uint256 modelId, address user) view returns (bool exists, uint8 score)",
    "function getTotalRatings() view returns (uint256)",
];

/// Exponential backoff delays in milliseconds.
const BACKOFF_DELAYS_MS: [u64; 3] = [500, 1500, 4000];

/// Jitter percentage for backoff (±10%).
const JITTER_PERCENT: f64 = 0.1;

/// Receipt polling interval while waiting for confirmation.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Ledger client backed by an HTTP JSON-RPC endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use modelrep_chain::{get_network, ChainClient, EthersChainClient};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let network = get_network("local").unwrap().to_config();
/// let client = EthersChainClient::new(&network)?
///     .with_signer("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")?;
///
/// println!("rating as {:?}", client.account());
/// # Ok(())
/// # }
/// ```
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
    contract: Contract<Provider<Http>>,
    abi: Abi,
    address: Address,
    wallet: RwLock<Option<LocalWallet>>,
    score_decimals: u32,
    poll_interval: Duration,
}

impl EthersChainClient {
    /// Create a read-only client for the network's contract.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the RPC URL or contract address is missing
    /// or invalid.
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| ChainError::ConfigError(format!("Invalid RPC URL: {}", e)))?;
        let address = network.contract()?;
        let abi = parse_abi(RATING_CONTRACT_ABI).map_err(|e| ChainError::ContractError(e.to_string()))?;

        let provider = Arc::new(provider);
        let contract = Contract::new(address, abi.clone(), provider.clone());

        Ok(Self {
            provider,
            contract,
            abi,
            address,
            wallet: RwLock::new(None),
            score_decimals: network.score_decimals,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Attach a local signer from a hex private key.
    ///
    /// The wallet starts on its own default chain; the submission flow
    /// switches it to the network's chain before signing.
    pub fn with_signer(self, private_key: &str) -> Result<Self> {
        let wallet: LocalWallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| ChainError::ConfigError("Invalid private key".to_string()))?;

        *self.wallet.write().unwrap_or_else(PoisonError::into_inner) = Some(wallet);
        Ok(self)
    }

    /// Override the receipt polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn contract_address(&self) -> Address {
        self.address
    }

    fn current_wallet(&self) -> Option<LocalWallet> {
        self.wallet.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run a read with exponential backoff retry on transient errors.
    async fn with_backoff<T, F, Fut>(&self, call: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for (attempt, base_delay) in BACKOFF_DELAYS_MS.iter().enumerate() {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    debug!(call, attempt, %error, "transient RPC failure");
                    last_error = Some(error);

                    // Apply jitter and sleep (except on last attempt)
                    if attempt < BACKOFF_DELAYS_MS.len() - 1 {
                        sleep(jittered(*base_delay)).await;
                    }
                }
            }
        }

        // All retries exhausted
        Err(last_error.unwrap_or(ChainError::RpcTimeout {
            attempts: BACKOFF_DELAYS_MS.len() as u32,
        }))
    }
}

fn jittered(base_delay_ms: u64) -> Duration {
    let jitter = rand::random::<f64>() * JITTER_PERCENT * 2.0 - JITTER_PERCENT;
    Duration::from_millis((base_delay_ms as f64 * (1.0 + jitter)) as u64)
}

fn contract_error(e: impl ToString) -> ChainError {
    ChainError::ContractError(e.to_string())
}

#[async_trait]
impl LedgerReader for EthersChainClient {
    async fn reputation(&self, model_id: u64) -> Result<ReputationSnapshot> {
        let (average, total): (U256, U256) = self
            .with_backoff("getReputation", || async move {
                self.contract
                    .method::<_, (U256, U256)>("getReputation", U256::from(model_id))
                    .map_err(contract_error)?
                    .call()
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))
            })
            .await?;

        Ok(ReputationSnapshot::from_fixed_point(
            model_id,
            average.low_u128(),
            self.score_decimals,
            total.low_u64(),
        ))
    }

    async fn user_rating(&self, model_id: u64, rater: Address) -> Result<Option<Score>> {
        let (exists, score): (bool, U256) = self
            .with_backoff("getUserRating", || async move {
                self.contract
                    .method::<_, (bool, U256)>("getUserRating", (U256::from(model_id), rater))
                    .map_err(contract_error)?
                    .call()
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))
            })
            .await?;

        if !exists {
            return Ok(None);
        }
        Score::new(score.low_u32() as u8).map(Some).map_err(contract_error)
    }

    async fn total_ratings(&self) -> Result<u64> {
        let total: U256 = self
            .with_backoff("getTotalRatings", || async move {
                self.contract
                    .method::<_, U256>("getTotalRatings", ())
                    .map_err(contract_error)?
                    .call()
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))
            })
            .await?;

        Ok(total.low_u64())
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn account(&self) -> Option<Address> {
        self.current_wallet().map(|w| w.address())
    }

    async fn chain_id(&self) -> Result<u64> {
        self.current_wallet()
            .map(|w| w.chain_id())
            .ok_or(ChainError::WalletNotConnected)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        if self.current_wallet().is_none() {
            return Err(ChainError::WalletNotConnected);
        }

        // A local signer can sign for any chain; the endpoint decides where it lands.
        let served = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| ChainError::classify(e.to_string()))?;
        if served != U256::from(chain_id) {
            return Err(ChainError::NetworkSwitchRejected {
                chain_id,
                reason: format!("RPC endpoint serves chain {}", served),
            });
        }

        let mut guard = self.wallet.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(wallet) = guard.take() {
            *guard = Some(wallet.with_chain_id(chain_id));
        }
        info!(chain_id, "wallet switched network");
        Ok(())
    }

    async fn submit_rating(&self, model_id: u64, score: Score) -> Result<H256> {
        let wallet = self.current_wallet().ok_or(ChainError::WalletNotConnected)?;
        let signer = Arc::new(SignerMiddleware::new(self.provider.as_ref().clone(), wallet));
        let contract = Contract::new(self.address, self.abi.clone(), signer);

        let call = contract
            .method::<_, ()>("rateModel", (U256::from(model_id), U256::from(score.get())))
            .map_err(contract_error)?;
        let pending = call
            .send()
            .await
            .map_err(|e| ChainError::classify(e.to_string()))?;
        let tx_hash = pending.tx_hash();

        info!(model_id, score = score.get(), tx_hash = ?tx_hash, "rating transaction broadcast");
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: H256, timeout: Duration) -> Result<()> {
        let pending = PendingTransaction::new(tx_hash, self.provider.as_ref())
            .interval(self.poll_interval)
            .confirmations(1);

        match tokio::time::timeout(timeout, pending).await {
            Err(_) => Err(ChainError::ConfirmationTimeout {
                tx_hash: format!("{:?}", tx_hash),
                seconds: timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(ChainError::classify(e.to_string())),
            Ok(Ok(None)) => Err(ChainError::Dropped(format!("{:?}", tx_hash))),
            Ok(Ok(Some(receipt))) if receipt.status == Some(U64::from(1)) => {
                debug!(tx_hash = ?tx_hash, block = ?receipt.block_number, "rating confirmed");
                Ok(())
            }
            Ok(Ok(Some(_))) => Err(ChainError::Reverted(format!("{:?}", tx_hash))),
        }
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus> {
        let receipt = self
            .with_backoff("eth_getTransactionReceipt", || async move {
                self.provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))
            })
            .await?;

        if let Some(receipt) = receipt {
            return Ok(if receipt.status == Some(U64::from(1)) {
                TxStatus::Confirmed
            } else {
                TxStatus::Reverted
            });
        }

        let transaction = self
            .with_backoff("eth_getTransactionByHash", || async move {
                self.provider
                    .get_transaction(tx_hash)
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))
            })
            .await?;

        Ok(if transaction.is_some() {
            TxStatus::Pending
        } else {
            TxStatus::Unknown
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::get_network;

    fn local() -> NetworkConfig {
        get_network("local").unwrap().to_config()
    }

    #[test]
    fn test_abi_parses() {
        let abi = parse_abi(RATING_CONTRACT_ABI).unwrap();
        assert!(abi.function("rateModel").is_ok());
        assert!(abi.function("getReputation").is_ok());
        assert!(abi.function("getUserRating").is_ok());
        assert!(abi.function("getTotalRatings").is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let mut network = local();
        network.rpc_url = "not-a-valid-url".into();
        assert!(matches!(EthersChainClient::new(&network), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_missing_contract() {
        let network = get_network("sepolia").unwrap().to_config();
        assert!(EthersChainClient::new(&network).is_err());
    }

    #[test]
    fn test_read_only_client_has_no_account() {
        let client = EthersChainClient::new(&local()).unwrap();
        assert!(client.account().is_none());
    }

    #[test]
    fn test_signer_sets_account() {
        // anvil default account #0
        let client = EthersChainClient::new(&local())
            .unwrap()
            .with_signer("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(client.account(), Some(expected));
    }

    #[test]
    fn test_invalid_key_is_not_echoed() {
        let err = EthersChainClient::new(&local())
            .unwrap()
            .with_signer("deadbeef-not-a-key")
            .err()
            .unwrap();
        assert!(!err.to_string().contains("deadbeef"));
    }

    #[tokio::test]
    async fn test_unreachable_rpc_fails_after_retries() {
        let mut network = local();
        network.rpc_url = "http://127.0.0.1:1".into();
        let client = EthersChainClient::new(&network).unwrap();
        assert!(client.total_ratings().await.is_err());
    }
}
