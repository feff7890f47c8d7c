//! Transaction fetching for the trade monitor.
//!
//! The `Fetcher` lists signatures for an address and retrieves transaction
//! logs for them. Page fetches run with bounded concurrency and never retry:
//! a signature that fails is reported as [`FetchOutcome::Failed`] and the rest
//! of the page carries on.

use crate::utils::error::Result;
use crate::utils::rpc::{DefaultRpcProvider, RpcProvider};
use futures_util::future::join_all;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// One entry of a signature listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// The transaction executed with an error.
    pub failed: bool,
}

/// The parts of a confirmed transaction the scanner needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub logs: Vec<String>,
}

impl TransactionDetail {
    fn from_encoded(signature: &str, tx: EncodedConfirmedTransactionWithStatusMeta) -> Self {
        let logs = match tx.transaction.meta.map(|meta| meta.log_messages) {
            Some(OptionSerializer::Some(logs)) => logs,
            _ => Vec::new(),
        };
        Self {
            signature: signature.to_string(),
            slot: tx.slot,
            block_time: tx.block_time,
            logs,
        }
    }
}

/// Result of fetching one signature of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(TransactionDetail),
    /// The node returned no transaction for the signature.
    Missing(String),
    Failed { signature: String, error: String },
}

/// Transaction fetcher over an [`RpcProvider`].
///
/// # Example
///
/// ```no_run
/// # use trade_event_monitor::Fetcher;
/// # use solana_sdk::commitment_config::CommitmentConfig;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::new("http://127.0.0.1:8899", CommitmentConfig::confirmed());
/// let program = "EAJ7QiDXgXH31m57RhDFMHTkBrDzxrFpcN8xUkPUqHLi".parse()?;
/// let page = fetcher.list_signatures(&program, None, 50).await?;
/// let outcomes = fetcher.fetch_page(&page).await;
/// # Ok(())
/// # }
/// ```
pub struct Fetcher {
    rpc: Arc<dyn RpcProvider>,
    commitment: CommitmentConfig,
    concurrency: usize,
    batch_delay: Duration,
}

impl Fetcher {
    /// Creates a new `Fetcher` with a [`DefaultRpcProvider`] backed by `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        let url = rpc_url.into();
        let provider = DefaultRpcProvider::new_with_commitment(&url, commitment);
        Self::with_provider(Arc::new(provider), commitment)
    }

    /// Creates a `Fetcher` backed by a custom [`RpcProvider`], e.g. a mock.
    #[must_use]
    pub fn with_provider(rpc: Arc<dyn RpcProvider>, commitment: CommitmentConfig) -> Self {
        Self {
            rpc,
            commitment,
            concurrency: DEFAULT_CONCURRENCY,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Sets the page fetch pool size (minimum 1) and the pause between chunks.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize, batch_delay: Duration) -> Self {
        self.concurrency = limit.max(1);
        self.batch_delay = batch_delay;
        self
    }

    #[must_use]
    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// Lists up to `limit` signatures for `address`, newest first, strictly
    /// older than `before` when given.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidSignature` if `before` is not a valid
    /// signature, or the RPC error if the listing fails.
    pub async fn list_signatures(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let before = before.map(Signature::from_str).transpose()?;
        let statuses = self
            .rpc
            .get_signatures_for_address(address, before, limit, Some(self.commitment))
            .await?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                failed: status.err.is_some(),
            })
            .collect())
    }

    /// Fetches one transaction's logs; `Ok(None)` when the node has no record of it.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidSignature` for a malformed signature, or
    /// the RPC error if the request fails.
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>> {
        let parsed = Signature::from_str(signature)?;
        let tx = self
            .rpc
            .get_transaction(&parsed, Some(self.commitment))
            .await?;
        Ok(tx.map(|tx| TransactionDetail::from_encoded(signature, tx)))
    }

    /// Fetches every signature of a page, `concurrency` at a time, with a
    /// short pause between chunks. Outcomes come back in page order.
    pub async fn fetch_page(&self, page: &[SignatureInfo]) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(page.len());

        for (index, chunk) in page.chunks(self.concurrency).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let results = join_all(chunk.iter().map(|info| async move {
                (info, self.get_transaction(&info.signature).await)
            }))
            .await;

            for (info, result) in results {
                let outcome = match result {
                    Ok(Some(detail)) => FetchOutcome::Fetched(detail),
                    Ok(None) => {
                        tracing::debug!(signature = %info.signature, "Transaction not found");
                        FetchOutcome::Missing(info.signature.clone())
                    }
                    Err(e) => {
                        tracing::warn!(
                            signature = %info.signature,
                            error = %e,
                            "Failed to fetch transaction, skipping"
                        );
                        FetchOutcome::Failed {
                            signature: info.signature.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }
}
