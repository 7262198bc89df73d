//! Transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;

use crate::blockchain::transaction::{SignedTx, UnsignedTx};
use crate::blockchain::types::{BlockchainError, BlockchainResult, Network};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "STAKE_ORCHESTRATOR_PRIVATE_KEY";

/// Length of a recoverable secp256k1 signature (r, s, v).
pub const SIGNATURE_LEN: usize = 65;

/// Signs unsigned transactions for an account.
///
/// Failures are final: the orchestrator never retries a signing error.
#[async_trait]
pub trait TxSigner: Send + Sync {
    async fn sign(
        &self,
        tx: &UnsignedTx,
        account_index: u32,
        network: Network,
    ) -> BlockchainResult<SignedTx>;
}

/// Single-key signer backed by a local secp256k1 private key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    network: Network,
}

impl LocalWallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Security
    /// The private key is parsed and stored securely. It is never logged.
    pub fn from_private_key(private_key_hex: &str, network: Network) -> BlockchainResult<Self> {
        // Strip 0x prefix if present
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            network = %network,
            "Wallet initialized"
        );

        Ok(Self { signer, network })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `STAKE_ORCHESTRATOR_PRIVATE_KEY` from environment.
    pub fn from_env(network: Network) -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, network)
    }

    /// Get the wallet's EVM address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Sign a 32-byte digest.
    pub async fn sign_hash(&self, hash: B256) -> BlockchainResult<alloy::signers::Signature> {
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))
    }
}

#[async_trait]
impl TxSigner for LocalWallet {
    async fn sign(
        &self,
        tx: &UnsignedTx,
        account_index: u32,
        network: Network,
    ) -> BlockchainResult<SignedTx> {
        if network != self.network {
            return Err(BlockchainError::Wallet(format!(
                "Wallet is bound to {}, refusing to sign for {}",
                self.network, network
            )));
        }

        let signature = self.sign_hash(tx.signing_hash()).await?;

        tracing::debug!(
            chain = %tx.chain,
            account_index,
            "Transaction signed"
        );

        let mut bytes = Vec::with_capacity(tx.bytes.len() + SIGNATURE_LEN);
        bytes.extend_from_slice(&tx.bytes);
        bytes.extend_from_slice(&signature.as_bytes());

        Ok(SignedTx {
            chain: tx.chain,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::Chain;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = LocalWallet::from_private_key(TEST_PRIVATE_KEY, Network::Testnet).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet =
            LocalWallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), Network::Mainnet)
                .unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = LocalWallet::from_private_key("invalid_key", Network::Mainnet);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[tokio::test]
    async fn test_sign_appends_signature() {
        let wallet = LocalWallet::from_private_key(TEST_PRIVATE_KEY, Network::Testnet).unwrap();
        let unsigned = UnsignedTx {
            chain: Chain::P,
            bytes: vec![7; 40],
            burned_fee: 1_000_000,
        };

        let signed = wallet.sign(&unsigned, 0, Network::Testnet).await.unwrap();
        assert_eq!(signed.chain, Chain::P);
        assert_eq!(signed.bytes.len(), 40 + SIGNATURE_LEN);
        assert_eq!(&signed.bytes[..40], unsigned.bytes.as_slice());

        // Deterministic (RFC 6979) signatures make re-signing idempotent.
        let again = wallet.sign(&unsigned, 0, Network::Testnet).await.unwrap();
        assert_eq!(signed, again);
    }

    #[tokio::test]
    async fn test_sign_rejects_wrong_network() {
        let wallet = LocalWallet::from_private_key(TEST_PRIVATE_KEY, Network::Testnet).unwrap();
        let unsigned = UnsignedTx {
            chain: Chain::C,
            bytes: vec![1],
            burned_fee: 0,
        };
        let err = wallet.sign(&unsigned, 0, Network::Mainnet).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Wallet(_)));
    }
}
