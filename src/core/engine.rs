//! Sync engine: one poll cycle lists a page of program signatures, fetches
//! and scans their transactions, merges the records into the event store,
//! advances the cursor and persists.
//!
//! Cycles run strictly one after another. The engine is the only writer of
//! the store; readers get a [`StoreSnapshot`] through a `watch` channel after
//! every persist.

use crate::config::MonitorConfig;
use crate::core::fetcher::{FetchOutcome, Fetcher};
use crate::core::log_registry::LogDecoderRegistry;
use crate::core::scanner::{invokes_program, LogScanner};
use crate::storage::{EventStore, StoreSnapshot};
use crate::types::record::TxContext;
use crate::utils::error::Result;
use crate::utils::logging;
use solana_sdk::pubkey::Pubkey;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Signatures listed.
    pub signatures: usize,
    /// Transactions fetched successfully.
    pub fetched: usize,
    /// Signatures the node had no transaction for.
    pub missing: usize,
    /// Signatures whose fetch failed and were skipped.
    pub fetch_failures: usize,
    /// Listed transactions that executed with an error.
    pub failed_transactions: usize,
    /// Fetched transactions whose logs show the program being invoked.
    pub relevant: usize,
    /// Records decoded from the page.
    pub decoded: usize,
    /// Records that were new to the store.
    pub added: usize,
    /// Records evicted to stay under the cap.
    pub evicted: usize,
    /// Cursor after the cycle.
    pub cursor: Option<String>,
    pub duration_ms: u64,
}

/// Drives poll cycles against one program.
pub struct SyncEngine {
    program_id: Pubkey,
    batch_size: usize,
    poll_interval: Duration,
    fetcher: Fetcher,
    scanner: LogScanner,
    store: EventStore,
    snapshot_tx: watch::Sender<StoreSnapshot>,
}

impl SyncEngine {
    /// Builds an engine from configuration, loading the cache file.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::StorageError` if the cache cannot be loaded or
    /// written back.
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.rpc_url.clone(), config.commitment_level.into())
            .with_concurrency(
                config.concurrency_limit,
                Duration::from_millis(config.batch_delay_ms),
            );
        let scanner = LogScanner::new(LogDecoderRegistry::default(), config.timestamp_policy);
        let store = EventStore::load(
            config.cache_path(),
            config.max_cache_events,
            chrono::Utc::now().timestamp_millis(),
        )?;
        Ok(Self::with_parts(config, fetcher, scanner, store))
    }

    /// Assembles an engine from prebuilt parts.
    #[must_use]
    pub fn with_parts(
        config: &MonitorConfig,
        fetcher: Fetcher,
        scanner: LogScanner,
        store: EventStore,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(store.snapshot());
        Self {
            program_id: config.program_id,
            batch_size: config.batch_size,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            fetcher,
            scanner,
            store,
            snapshot_tx,
        }
    }

    /// Receiver that always holds the last persisted store state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn scanner(&self) -> &LogScanner {
        &self.scanner
    }

    /// Runs one poll cycle.
    ///
    /// Per-signature fetch failures are skipped. If listing fails or the store
    /// cannot be persisted the error is returned and the cursor keeps its
    /// previous value, so the next cycle retries the same range.
    ///
    /// # Errors
    ///
    /// Returns the listing error or the persistence error.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let before = self.store.state().last_signature.clone();

        let page = self
            .fetcher
            .list_signatures(&self.program_id, before.as_deref(), self.batch_size)
            .await?;

        let mut report = CycleReport {
            signatures: page.len(),
            cursor: before.clone(),
            ..CycleReport::default()
        };
        let Some(newest) = page.first() else {
            logging::log_cycle(&report);
            return Ok(report);
        };
        let newest = newest.signature.clone();
        report.failed_transactions = page.iter().filter(|info| info.failed).count();

        let program = self.program_id.to_string();
        let mut records = Vec::new();
        for outcome in self.fetcher.fetch_page(&page).await {
            match outcome {
                FetchOutcome::Fetched(detail) => {
                    report.fetched += 1;
                    if invokes_program(&detail.logs, &program) {
                        report.relevant += 1;
                    }
                    let ctx = TxContext {
                        signature: detail.signature,
                        slot: detail.slot,
                        block_time: detail.block_time,
                    };
                    let decoded = self.scanner.scan(&detail.logs, &ctx);
                    logging::log_transaction(&ctx.signature, ctx.slot, decoded.len());
                    records.extend(decoded);
                }
                FetchOutcome::Missing(_) => report.missing += 1,
                FetchOutcome::Failed { .. } => report.fetch_failures += 1,
            }
        }
        report.decoded = records.len();

        report.added = self.store.merge_insert(records);
        report.evicted = self.store.enforce_capacity();
        self.store.set_cursor(Some(newest));
        self.store.touch(chrono::Utc::now().timestamp_millis());

        if let Err(e) = self.store.persist() {
            self.store.set_cursor(before);
            return Err(e);
        }
        self.snapshot_tx.send_replace(self.store.snapshot());

        report.cursor = self.store.state().last_signature.clone();
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        logging::log_cycle(&report);
        self.scanner.registry().metrics().report();
        Ok(report)
    }

    /// Runs cycles on the poll interval until `token` is cancelled, then
    /// persists the store.
    ///
    /// A cycle in flight when the token fires is abandoned; it has not touched
    /// the store at that point because merging happens after the last await.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::StorageError` if the final persist fails.
    pub async fn run(mut self, token: CancellationToken) -> Result<()> {
        tracing::info!(interval_s = self.poll_interval.as_secs(), "Polling started");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    logging::log(logging::LogLevel::Info, "Shutdown requested, abandoning cycle");
                    break;
                }
                result = self.run_cycle() => match result {
                    Ok(report) => {
                        if report.fetch_failures > 0 {
                            tracing::warn!(
                                failures = report.fetch_failures,
                                signatures = report.signatures,
                                "Some transactions could not be fetched this cycle"
                            );
                        }
                    }
                    Err(e) => logging::log_error("Poll cycle failed (retrying next tick)", &e.to_string()),
                },
            }
        }

        self.store.persist()?;
        logging::log_shutdown(self.store.len());
        Ok(())
    }
}
