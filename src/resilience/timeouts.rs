//! Timeout enforcement.
//!
//! Every ledger call goes through [`with_timeout`] so a silent node can never
//! hang a workflow.

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Await `fut`, mapping an elapsed deadline to [`BlockchainError::Timeout`].
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> BlockchainResult<T>
where
    F: Future<Output = BlockchainResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(BlockchainError::Timeout(duration.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let result: BlockchainResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BlockchainError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
