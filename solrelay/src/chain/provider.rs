//! Chain client abstraction and its JSON-RPC implementation.

use std::fmt;

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcError;
use solana_commitment_config::CommitmentConfig;
use solana_hash::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::Transaction;
use solana_transaction::versioned::VersionedTransaction;
use solana_transaction_status_client_types::UiTransactionEncoding;

/// Errors raised by chain access.
///
/// These are infrastructure failures. The verifier surfaces them as a
/// retryable condition, never as "payment not found".
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    /// The RPC request itself failed (transport error, node error, timeout).
    #[error("chain RPC request failed: {0}")]
    Rpc(String),
    /// The RPC response could not be interpreted.
    #[error("malformed chain response: {0}")]
    MalformedResponse(String),
}

impl From<ClientError> for ChainClientError {
    fn from(e: ClientError) -> Self {
        Self::Rpc(e.to_string())
    }
}

/// Read and write access to the ledger, as required by the relay.
///
/// Object safe so the verifier, executor, and tests can share one
/// `Arc<dyn ChainClient>`.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// Returns signatures of recent successful transactions involving
    /// `address`, most recent first, at most `limit` entries.
    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainClientError>;

    /// Fetches and decodes the transaction for `signature`.
    async fn transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, ChainClientError>;

    /// Fetches a fresh blockhash for transaction submission.
    async fn latest_blockhash(&self) -> Result<Hash, ChainClientError>;

    /// Submits a signed transaction and waits for confirmation at the
    /// client's commitment level.
    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, ChainClientError>;

    /// Whether an account exists on chain.
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainClientError>;

    /// Lamport balance of an account.
    async fn balance(&self, address: &Pubkey) -> Result<u64, ChainClientError>;
}

/// [`ChainClient`] backed by the nonblocking Solana JSON-RPC client.
///
/// The commitment level is applied to every query and to submission
/// confirmation, so "confirmed" vs "finalized" is a single configuration
/// switch.
pub struct RpcChainClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl RpcChainClient {
    /// Creates a client for the given RPC endpoint and commitment level.
    #[must_use]
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(url.into(), commitment),
            commitment,
        }
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainClientError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        let statuses = self
            .rpc
            .get_signatures_for_address_with_config(address, config)
            .await?;
        let mut signatures = Vec::with_capacity(statuses.len());
        for status in statuses {
            // Failed transactions never carry a credited payment.
            if status.err.is_some() {
                continue;
            }
            let signature = status
                .signature
                .parse()
                .map_err(|e| ChainClientError::MalformedResponse(format!("bad signature: {e}")))?;
            signatures.push(signature);
        }
        Ok(signatures)
    }

    async fn transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, ChainClientError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let fetched = match self.rpc.get_transaction_with_config(signature, config).await {
            Ok(fetched) => fetched,
            // A signature the node holds no record of is a skip for the
            // verifier, not an infrastructure failure.
            Err(e) if transaction_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let transaction = fetched.transaction.transaction.decode().ok_or_else(|| {
            ChainClientError::MalformedResponse(format!(
                "transaction {signature} could not be decoded"
            ))
        })?;
        Ok(Some(transaction))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainClientError> {
        Ok(self.rpc.get_latest_blockhash().await?)
    }

    async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, ChainClientError> {
        Ok(self.rpc.send_and_confirm_transaction(transaction).await?)
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainClientError> {
        let accounts = self.rpc.get_multiple_accounts(&[*address]).await?;
        Ok(accounts.first().cloned().flatten().is_some())
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, ChainClientError> {
        Ok(self.rpc.get_balance(address).await?)
    }
}

/// Whether a `getTransaction` failure means the node holds no record of the
/// signature. A pruned or unknown transaction comes back as a JSON `null`
/// result, which the client surfaces as a deserialization error; some nodes
/// answer with a "not found" RPC error instead.
fn transaction_not_found(e: &ClientError) -> bool {
    match e.kind() {
        ClientErrorKind::SerdeJson(_) => true,
        ClientErrorKind::RpcError(RpcError::ForUser(message)) => message.contains("not found"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_transaction_result_classifies_as_not_found() {
        let null_result = serde_json::from_value::<u64>(serde_json::Value::Null).unwrap_err();
        let error = ClientError::from(ClientErrorKind::SerdeJson(null_result));
        assert!(transaction_not_found(&error));
    }

    #[test]
    fn not_found_rpc_error_classifies_as_not_found() {
        let error = ClientError::from(ClientErrorKind::RpcError(RpcError::ForUser(
            "transaction not found".to_owned(),
        )));
        assert!(transaction_not_found(&error));
    }

    #[test]
    fn transport_failures_stay_fatal() {
        let error = ClientError::from(ClientErrorKind::Custom("connection reset".to_owned()));
        assert!(!transaction_not_found(&error));
    }
}
