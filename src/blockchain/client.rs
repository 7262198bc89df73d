//! Ledger JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Issue P-Chain (`platform.*`) and C-Chain atomic (`avax.*`) JSON-RPC calls
//! - Query C-Chain EVM state (balances, base fee) through an alloy provider
//! - Fail over across configured endpoints on transport errors and timeouts
//! - Validate every response against a typed shape at the boundary

use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::blockchain::ledger::{LedgerRpc, UtxoSource};
use crate::blockchain::transaction::SignedTx;
use crate::blockchain::types::{
    Account, AtomicTxStatusResponse, BlockchainError, BlockchainResult, Chain, ChainBalance,
    Network, PChainTxStatusResponse, RpcConfig, TxId,
};
use crate::blockchain::utxo::{AtomicUtxos, Utxo, UtxoSet};
use crate::resilience::{with_timeout, Transient};
use crate::staking::types::Validator;

const P_CHAIN_PATH: &str = "/ext/bc/P";
const C_CHAIN_AVAX_PATH: &str = "/ext/bc/C/avax";
const C_CHAIN_EVM_PATH: &str = "/ext/bc/C/rpc";
const UTXO_PAGE_LIMIT: u32 = 1024;

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueTxResponse {
    #[serde(rename = "txID")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct CurrentSupplyResponse {
    supply: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    unlocked: String,
}

#[derive(Debug, Deserialize)]
struct UtxosResponse {
    utxos: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentValidatorsResponse {
    validators: Vec<RawValidator>,
}

/// Validator as returned by `platform.getCurrentValidators` (numbers are strings).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidator {
    #[serde(rename = "nodeID")]
    pub node_id: String,
    pub start_time: String,
    pub end_time: String,
    pub weight: String,
    #[serde(default)]
    pub delegator_weight: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub delegation_fee: Option<String>,
    #[serde(default)]
    pub connected: Option<bool>,
}

impl TryFrom<RawValidator> for Validator {
    type Error = BlockchainError;

    fn try_from(raw: RawValidator) -> Result<Self, Self::Error> {
        const METHOD: &str = "platform.getCurrentValidators";
        Ok(Validator {
            start_time: parse_u64(METHOD, "startTime", &raw.start_time)?,
            end_time: parse_u64(METHOD, "endTime", &raw.end_time)?,
            stake_amount: parse_u64(METHOD, "weight", &raw.weight)?,
            delegator_weight: match raw.delegator_weight.as_deref() {
                Some(w) => parse_u64(METHOD, "delegatorWeight", w)?,
                None => 0,
            },
            uptime_percent: parse_decimal(METHOD, "uptime", raw.uptime.as_deref())?,
            delegation_fee_percent: parse_decimal(
                METHOD,
                "delegationFee",
                raw.delegation_fee.as_deref(),
            )?,
            connected: raw.connected.unwrap_or(false),
            node_id: raw.node_id,
        })
    }
}

fn parse_u64(method: &str, field: &str, value: &str) -> BlockchainResult<u64> {
    value.parse().map_err(|e| BlockchainError::Decode {
        method: method.to_string(),
        reason: format!("field {} = '{}': {}", field, value, e),
    })
}

fn parse_decimal(method: &str, field: &str, value: Option<&str>) -> BlockchainResult<Decimal> {
    match value {
        None => Ok(Decimal::ZERO),
        Some(v) => Decimal::from_str(v).map_err(|e| BlockchainError::Decode {
            method: method.to_string(),
            reason: format!("field {} = '{}': {}", field, v, e),
        }),
    }
}

/// JSON-RPC client for a ledger node, with failover support.
#[derive(Clone)]
pub struct LedgerClient {
    /// HTTP client shared by all endpoints.
    http: reqwest::Client,
    /// Node base URLs (primary + failovers).
    endpoints: Vec<Url>,
    /// EVM providers for the C-Chain, one per endpoint.
    evm_providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Configuration.
    config: RpcConfig,
    /// Network the node belongs to.
    network: Network,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// Invalid failover URLs are skipped with a warning; an invalid primary URL
    /// is an error.
    pub fn new(config: RpcConfig, network: Network) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.timeout_secs);
        let mut endpoints = Vec::new();

        // 1. Add primary endpoint
        let primary: Url = config.url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.url, e))
        })?;
        endpoints.push(primary);

        // 2. Add failover endpoints
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let mut evm_providers = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let evm_url = endpoint.join(C_CHAIN_EVM_PATH).map_err(|e| {
                BlockchainError::Rpc(format!("Invalid C-Chain URL for '{}': {}", endpoint, e))
            })?;
            evm_providers.push(
                Arc::new(ProviderBuilder::new().connect_http(evm_url))
                    as Arc<dyn Provider + Send + Sync>,
            );
        }

        let http = reqwest::Client::builder()
            .timeout(timeout_duration)
            .build()
            .map_err(|e| BlockchainError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            rpc_url = %config.url,
            failovers = endpoints.len() - 1,
            network = %network,
            "Ledger client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            evm_providers,
            config,
            network,
            timeout_duration,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Issue a JSON-RPC call, failing over to the next endpoint on transient errors.
    ///
    /// Errors reported by the node itself are returned as-is: another node
    /// would reject the same request.
    async fn call<P, R>(&self, path: &str, method: &str, params: P) -> BlockchainResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let url = endpoint.join(path).map_err(|e| {
                BlockchainError::Rpc(format!("Invalid endpoint path {}: {}", path, e))
            })?;

            match with_timeout(self.timeout_duration, self.post(url, &body, method)).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                }
                Err(e) => return Err(e),
            }
        }

        Err(BlockchainError::Rpc(format!(
            "All RPC providers failed for {}",
            method
        )))
    }

    async fn post<R>(&self, url: Url, body: &serde_json::Value, method: &str) -> BlockchainResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(BlockchainError::Rpc(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: JsonRpcResponse<R> =
            response.json().await.map_err(|e| BlockchainError::Decode {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        match (envelope.result, envelope.error) {
            (_, Some(err)) => Err(BlockchainError::RpcResponse {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(BlockchainError::Decode {
                method: method.to_string(),
                reason: "neither result nor error present".to_string(),
            }),
        }
    }

    /// Query C-Chain EVM state, failing over across providers.
    async fn evm_balance(&self, account: &Account) -> BlockchainResult<u128> {
        for (i, provider) in self.evm_providers.iter().enumerate() {
            let fut = provider.get_balance(account.evm_address);
            match tokio::time::timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => {
                    return u128::try_from(result).map_err(|_| BlockchainError::Decode {
                        method: "eth_getBalance".to_string(),
                        reason: format!("balance {} exceeds u128", result),
                    })
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to get balance".to_string()))
    }

    async fn atomic_utxos(
        &self,
        path: &str,
        method: &str,
        address: String,
        source: Chain,
    ) -> BlockchainResult<UtxoSet> {
        let response: UtxosResponse = self
            .call(
                path,
                method,
                json!({
                    "addresses": [address],
                    "sourceChain": source.alias(),
                    "limit": UTXO_PAGE_LIMIT,
                    "encoding": "hex",
                }),
            )
            .await?;

        let utxos = response
            .utxos
            .iter()
            .map(|encoded| Utxo::from_hex(encoded))
            .collect::<BlockchainResult<Vec<_>>>()?;
        Ok(UtxoSet::new(utxos))
    }
}

#[async_trait]
impl LedgerRpc for LedgerClient {
    async fn send_transaction(&self, tx: &SignedTx, network: Network) -> BlockchainResult<TxId> {
        if network != self.network {
            return Err(BlockchainError::NotAvailable(format!(
                "client is connected to {}, not {}",
                self.network, network
            )));
        }

        let (path, method) = match tx.chain {
            Chain::P => (P_CHAIN_PATH, "platform.issueTx"),
            Chain::C => (C_CHAIN_AVAX_PATH, "avax.issueTx"),
        };
        let response: IssueTxResponse = self
            .call(path, method, json!({ "tx": tx.to_hex(), "encoding": "hex" }))
            .await?;

        tracing::debug!(chain = %tx.chain, tx_id = %response.tx_id, "Transaction issued");
        Ok(TxId(response.tx_id))
    }

    async fn get_tx_status(&self, tx_id: &TxId) -> BlockchainResult<PChainTxStatusResponse> {
        self.call(P_CHAIN_PATH, "platform.getTxStatus", json!({ "txID": tx_id }))
            .await
    }

    async fn get_atomic_tx_status(&self, tx_id: &TxId) -> BlockchainResult<AtomicTxStatusResponse> {
        self.call(C_CHAIN_AVAX_PATH, "avax.getAtomicTxStatus", json!({ "txID": tx_id }))
            .await
    }

    async fn get_base_fee(&self) -> BlockchainResult<u128> {
        for (i, provider) in self.evm_providers.iter().enumerate() {
            let fut = provider.get_gas_price();
            match tokio::time::timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to get base fee".to_string()))
    }

    async fn get_current_supply(&self) -> BlockchainResult<u64> {
        let response: CurrentSupplyResponse = self
            .call(P_CHAIN_PATH, "platform.getCurrentSupply", json!({}))
            .await?;
        parse_u64("platform.getCurrentSupply", "supply", &response.supply)
    }

    async fn get_current_validators(&self) -> BlockchainResult<Vec<Validator>> {
        let response: CurrentValidatorsResponse = self
            .call(P_CHAIN_PATH, "platform.getCurrentValidators", json!({}))
            .await?;
        response
            .validators
            .into_iter()
            .map(Validator::try_from)
            .collect()
    }

    async fn get_balance(&self, chain: Chain, account: &Account) -> BlockchainResult<ChainBalance> {
        match chain {
            Chain::C => Ok(ChainBalance::new(Chain::C, self.evm_balance(account).await?)),
            Chain::P => {
                let response: BalanceResponse = self
                    .call(
                        P_CHAIN_PATH,
                        "platform.getBalance",
                        json!({ "addresses": [account.p_address()] }),
                    )
                    .await?;
                let unlocked = parse_u64("platform.getBalance", "unlocked", &response.unlocked)?;
                Ok(ChainBalance::new(Chain::P, unlocked as u128))
            }
        }
    }
}

#[async_trait]
impl UtxoSource for LedgerClient {
    async fn get_atomic_utxos(
        &self,
        account: &Account,
        network: Network,
    ) -> BlockchainResult<AtomicUtxos> {
        if network != self.network {
            return Err(BlockchainError::NotAvailable(format!(
                "client is connected to {}, not {}",
                self.network, network
            )));
        }

        let p_chain = self
            .atomic_utxos(P_CHAIN_PATH, "platform.getUTXOs", account.p_address(), Chain::C)
            .await?;
        let c_chain = self
            .atomic_utxos(
                C_CHAIN_AVAX_PATH,
                "avax.getUTXOs",
                account.c_atomic_address(),
                Chain::P,
            )
            .await?;

        Ok(AtomicUtxos { p_chain, c_chain })
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("rpc_url", &self.config.url)
            .field("network", &self.network)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}
