//! Shared utilities for integration tests.

#![allow(dead_code)]

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use stake_orchestrator::blockchain::ledger::{LedgerRpc, UtxoSource};
use stake_orchestrator::blockchain::transaction::{
    DelegatorParams, ExportParams, ImportParams, SignedTx, TxFactory, UnsignedTx,
};
use stake_orchestrator::blockchain::types::{
    Account, AtomicTxStatus, AtomicTxStatusResponse, BlockchainError, BlockchainResult, Chain,
    ChainBalance, Network, PChainTxStatus, PChainTxStatusResponse, TxId, WEI_PER_NANO,
};
use stake_orchestrator::blockchain::utxo::{AtomicUtxos, Utxo, UtxoSet};
use stake_orchestrator::blockchain::wallet::TxSigner;
use stake_orchestrator::config::schema::{FeeConfig, OrchestratorConfig, RetryConfig};
use stake_orchestrator::staking::{
    Collaborators, LedgerFeeOracle, NetworkParams, Operation, StakingService, Validator,
};

pub const AVAX: u64 = 1_000_000_000;
pub const SIGNATURE: &[u8] = b"|signed";

/// An issued transaction as the mock ledger sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTx {
    pub tx_id: TxId,
    pub operation: Operation,
    pub amount: u64,
    pub payload: Vec<u8>,
    pub committed: bool,
}

/// Scripted chain state.
#[derive(Debug, Default)]
pub struct LedgerState {
    pub p_balance: u64,
    pub c_balance_wei: u128,
    pub p_queue: Vec<u64>,
    pub c_queue: Vec<u64>,
    /// C-Chain base fee in wei per gas.
    pub base_fee_wei: u128,
    /// Added to the base fee after every read.
    pub base_fee_drift_wei: u128,
    /// Base fees served before falling back to `base_fee_wei`.
    pub base_fee_script: VecDeque<u128>,
    /// Base fee each export was built with.
    pub built_base_fees: Vec<Option<u64>>,
    pub current_supply: u64,
    pub validators: Vec<Validator>,

    pub issued: Vec<IssuedTx>,
    pub broadcast_attempts: Vec<Vec<u8>>,
    pub status_polls: u32,

    /// Transient failures before a broadcast succeeds.
    pub fail_broadcasts: u32,
    /// Broadcasts that reach the ledger but whose reply is lost.
    pub lose_broadcast_replies: u32,
    /// Transient failures before a UTXO query succeeds.
    pub fail_utxo_queries: u32,
    /// Transactions of this operation never leave `Processing`.
    pub stuck: Option<Operation>,
    /// Transactions of this operation are dropped.
    pub dropped: Option<Operation>,
    /// The signer refuses every transaction.
    pub reject_signing: bool,
    /// P-Chain balance reads that still miss a committed import.
    pub p_balance_lag: u32,
    pending_p_credit: u64,
    builds: u64,
}

impl LedgerState {
    fn apply(&mut self, operation: Operation, amount: u64) {
        let fees = FeeConfig::default();
        match operation {
            Operation::ExportC => {
                self.c_balance_wei -= amount as u128 * WEI_PER_NANO;
                self.p_queue.push(amount);
            }
            Operation::ImportP => {
                let total: u64 = self.p_queue.drain(..).sum();
                let credit = total - fees.import_p_fee;
                if self.p_balance_lag > 0 {
                    self.pending_p_credit += credit;
                } else {
                    self.p_balance += credit;
                }
            }
            Operation::Delegate => self.p_balance -= amount,
            Operation::ExportP => {
                self.p_balance -= amount + fees.export_p_fee;
                self.c_queue.push(amount);
            }
            Operation::ImportC => {
                let total: u64 = self.c_queue.drain(..).sum();
                self.c_balance_wei += total as u128 * WEI_PER_NANO;
            }
        }
    }
}

/// In-memory ledger implementing every collaborator trait.
#[derive(Clone, Default)]
pub struct MockLedger {
    pub state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new(p_balance: u64, c_balance: u64) -> Self {
        let ledger = Self::default();
        {
            let mut state = ledger.state.lock().unwrap();
            state.p_balance = p_balance;
            state.c_balance_wei = c_balance as u128 * WEI_PER_NANO;
            state.base_fee_wei = 25 * WEI_PER_NANO;
            state.current_supply = 400_000_000 * AVAX;
        }
        ledger
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn issued_operations(&self) -> Vec<Operation> {
        self.with(|s| s.issued.iter().map(|t| t.operation).collect())
    }

    /// `(committed, dropped)` for `tx_id`, applying its effect on first commit.
    fn status(&self, tx_id: &TxId) -> BlockchainResult<(bool, bool)> {
        self.with(|s| -> BlockchainResult<(bool, bool)> {
            s.status_polls += 1;
            let index = s
                .issued
                .iter()
                .position(|t| &t.tx_id == tx_id)
                .ok_or_else(|| BlockchainError::RpcResponse {
                    method: "getTxStatus".to_string(),
                    code: -32000,
                    message: format!("unknown tx {}", tx_id),
                })?;
            let operation = s.issued[index].operation;
            if s.dropped == Some(operation) {
                return Ok((false, true));
            }
            if s.stuck == Some(operation) {
                return Ok((false, false));
            }
            if !s.issued[index].committed {
                s.issued[index].committed = true;
                let amount = s.issued[index].amount;
                s.apply(operation, amount);
            }
            Ok((true, false))
        })
    }
}

impl MockLedger {
    /// Builds carry a sequence number so separate builds never share a payload.
    fn encode(&self, operation: Operation, amount: u64, chain: Chain) -> UnsignedTx {
        let seq = self.with(|s| {
            s.builds += 1;
            s.builds
        });
        UnsignedTx {
            chain,
            bytes: format!("{}:{}:{}", operation, amount, seq).into_bytes(),
            burned_fee: 0,
        }
    }
}

fn decode(bytes: &[u8]) -> (Operation, u64) {
    let text = String::from_utf8_lossy(bytes);
    let body = text.trim_end_matches(std::str::from_utf8(SIGNATURE).unwrap());
    let mut fields = body.split(':');
    let (op, amount) = (fields.next().unwrap(), fields.next().unwrap());
    let operation = match op {
        "EXPORT_C" => Operation::ExportC,
        "IMPORT_P" => Operation::ImportP,
        "DELEGATE" => Operation::Delegate,
        "EXPORT_P" => Operation::ExportP,
        "IMPORT_C" => Operation::ImportC,
        other => panic!("unknown operation {}", other),
    };
    (operation, amount.parse().unwrap())
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn send_transaction(&self, tx: &SignedTx, _network: Network) -> BlockchainResult<TxId> {
        self.with(|s| {
            s.broadcast_attempts.push(tx.bytes.clone());
            if s.fail_broadcasts > 0 {
                s.fail_broadcasts -= 1;
                return Err(BlockchainError::Rpc("connection reset".to_string()));
            }
            if s.issued.iter().any(|t| t.payload == tx.bytes) {
                return Err(BlockchainError::RpcResponse {
                    method: "issueTx".to_string(),
                    code: -32000,
                    message: "duplicate tx".to_string(),
                });
            }
            let (operation, amount) = decode(&tx.bytes);
            let tx_id = tx.tx_id();
            s.issued.push(IssuedTx {
                tx_id: tx_id.clone(),
                operation,
                amount,
                payload: tx.bytes.clone(),
                committed: false,
            });
            if s.lose_broadcast_replies > 0 {
                s.lose_broadcast_replies -= 1;
                return Err(BlockchainError::Rpc("connection reset".to_string()));
            }
            Ok(tx_id)
        })
    }

    async fn get_tx_status(&self, tx_id: &TxId) -> BlockchainResult<PChainTxStatusResponse> {
        let (committed, dropped) = self.status(tx_id)?;
        Ok(PChainTxStatusResponse {
            status: if committed {
                PChainTxStatus::Committed
            } else if dropped {
                PChainTxStatus::Dropped
            } else {
                PChainTxStatus::Processing
            },
            reason: dropped.then(|| "failed to spend UTXO".to_string()),
        })
    }

    async fn get_atomic_tx_status(&self, tx_id: &TxId) -> BlockchainResult<AtomicTxStatusResponse> {
        let (committed, dropped) = self.status(tx_id)?;
        Ok(AtomicTxStatusResponse {
            status: if committed {
                AtomicTxStatus::Accepted
            } else if dropped {
                AtomicTxStatus::Dropped
            } else {
                AtomicTxStatus::Processing
            },
            block_height: None,
        })
    }

    async fn get_base_fee(&self) -> BlockchainResult<u128> {
        Ok(self.with(|s| {
            if let Some(fee) = s.base_fee_script.pop_front() {
                return fee;
            }
            let fee = s.base_fee_wei;
            s.base_fee_wei += s.base_fee_drift_wei;
            fee
        }))
    }

    async fn get_current_supply(&self) -> BlockchainResult<u64> {
        Ok(self.with(|s| s.current_supply))
    }

    async fn get_current_validators(&self) -> BlockchainResult<Vec<Validator>> {
        Ok(self.with(|s| s.validators.clone()))
    }

    async fn get_balance(&self, chain: Chain, _account: &Account) -> BlockchainResult<ChainBalance> {
        Ok(self.with(|s| match chain {
            Chain::C => ChainBalance::new(Chain::C, s.c_balance_wei),
            Chain::P => {
                if s.p_balance_lag > 0 {
                    s.p_balance_lag -= 1;
                    if s.p_balance_lag == 0 {
                        s.p_balance += std::mem::take(&mut s.pending_p_credit);
                    }
                }
                ChainBalance::new(Chain::P, s.p_balance as u128)
            }
        }))
    }
}

fn utxo_set(amounts: &[u64]) -> UtxoSet {
    UtxoSet::new(
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Utxo {
                tx_id: B256::repeat_byte(0x11),
                output_index: i as u32,
                asset_id: B256::repeat_byte(0x22),
                amount: *amount,
            })
            .collect(),
    )
}

#[async_trait]
impl UtxoSource for MockLedger {
    async fn get_atomic_utxos(
        &self,
        _account: &Account,
        _network: Network,
    ) -> BlockchainResult<AtomicUtxos> {
        self.with(|s| {
            if s.fail_utxo_queries > 0 {
                s.fail_utxo_queries -= 1;
                return Err(BlockchainError::Timeout(10));
            }
            Ok(AtomicUtxos {
                p_chain: utxo_set(&s.p_queue),
                c_chain: utxo_set(&s.c_queue),
            })
        })
    }
}

#[async_trait]
impl TxFactory for MockLedger {
    async fn create_export_tx(&self, params: &ExportParams) -> BlockchainResult<UnsignedTx> {
        let operation = match params.source {
            Chain::C => Operation::ExportC,
            Chain::P => Operation::ExportP,
        };
        self.with(|s| s.built_base_fees.push(params.base_fee));
        Ok(self.encode(operation, params.amount, params.source))
    }

    async fn create_import_tx(&self, params: &ImportParams) -> BlockchainResult<UnsignedTx> {
        let operation = match params.destination {
            Chain::P => Operation::ImportP,
            Chain::C => Operation::ImportC,
        };
        Ok(self.encode(operation, 0, params.destination))
    }

    async fn create_delegator_tx(&self, params: &DelegatorParams) -> BlockchainResult<UnsignedTx> {
        Ok(self.encode(Operation::Delegate, params.amount, Chain::P))
    }
}

#[async_trait]
impl TxSigner for MockLedger {
    async fn sign(
        &self,
        tx: &UnsignedTx,
        _account_index: u32,
        _network: Network,
    ) -> BlockchainResult<SignedTx> {
        if self.with(|s| s.reject_signing) {
            return Err(BlockchainError::Wallet("key locked".to_string()));
        }
        let mut bytes = tx.bytes.clone();
        bytes.extend_from_slice(SIGNATURE);
        Ok(SignedTx {
            chain: tx.chain,
            bytes,
        })
    }
}

pub fn test_account() -> Account {
    Account {
        index: 0,
        xp_address: "avax1test".to_string(),
        evm_address: Address::repeat_byte(0x42),
    }
}

/// Config with millisecond backoff so exhausted budgets finish quickly.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retries: RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 4,
            constant_interval_ms: 1,
            ..RetryConfig::default()
        },
        ..OrchestratorConfig::default()
    }
}

pub fn service_with(ledger: &MockLedger, config: OrchestratorConfig) -> StakingService {
    let shared = Arc::new(ledger.clone());
    let fees = Arc::new(LedgerFeeOracle::new(shared.clone(), config.fees.clone()));
    StakingService::new(
        Collaborators {
            ledger: shared.clone(),
            utxos: shared.clone(),
            factory: shared.clone(),
            signer: shared,
            fees,
        },
        NetworkParams::for_network(config.network),
        config,
    )
}

pub fn service(ledger: &MockLedger) -> StakingService {
    service_with(ledger, fast_config())
}

/// Start a JSON-RPC backend answering each request body with `f(body)`.
pub async fn start_json_rpc_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let body = read_request_body(&mut socket).await;
                        let request = serde_json::from_slice(&body).unwrap_or_default();
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return Vec::new(),
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = header_end + 4;
            if buf.len() >= body_start + content_length {
                return buf[body_start..body_start + content_length].to_vec();
            }
        }
    }
}
