use async_trait::async_trait;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};

use crate::utils::error::Result;

/// The two chain queries the monitor needs.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Signatures touching `address`, newest first. `before` is exclusive.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
        commitment: Option<CommitmentConfig>,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>>;

    /// Full transaction with logs, or `None` when the node does not know it
    /// (yet) at the requested commitment.
    async fn get_transaction(
        &self,
        signature: &Signature,
        commitment: Option<CommitmentConfig>,
    ) -> Result<Option<EncodedConfirmedTransactionWithStatusMeta>>;
}

/// [`RpcProvider`] over the nonblocking JSON-RPC client.
pub struct DefaultRpcProvider {
    client: RpcClient,
}

impl DefaultRpcProvider {
    /// Creates a provider for `rpc_url` whose requests default to `commitment`.
    pub fn new_with_commitment(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
        }
    }
}

#[async_trait]
impl RpcProvider for DefaultRpcProvider {
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
        commitment: Option<CommitmentConfig>,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>> {
        let config = solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config {
            before,
            until: None,
            limit: Some(limit),
            commitment,
        };
        Ok(self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?)
    }

    async fn get_transaction(
        &self,
        signature: &Signature,
        commitment: Option<CommitmentConfig>,
    ) -> Result<Option<EncodedConfirmedTransactionWithStatusMeta>> {
        // `get_transaction_with_config` turns a null result into an error;
        // sending the raw request keeps "not found" distinguishable.
        let config = solana_client::rpc_config::RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(commitment.unwrap_or_else(|| self.client.commitment())),
            max_supported_transaction_version: Some(0),
        };
        Ok(self
            .client
            .send(
                RpcRequest::GetTransaction,
                json!([signature.to_string(), config]),
            )
            .await?)
    }
}
