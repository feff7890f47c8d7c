//! Read-only views over the event store, plus an address-targeted query that
//! goes to the chain instead of the cache.

use crate::core::fetcher::{FetchOutcome, Fetcher};
use crate::core::scanner::LogScanner;
use crate::storage::StoreSnapshot;
use crate::types::events::TradeType;
use crate::types::record::{TradeRecord, TxContext};
use crate::utils::error::{MonitorError, Result};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use tokio::sync::watch;

/// One page of records.
///
/// `has_more` is true when the page came back full. When the remaining count
/// is an exact multiple of the page size the last full page still reports
/// `has_more` and the following page is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<TradeRecord>,
    /// Pass back as `cursor` to get the next page.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Aggregate numbers over the cached records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cached: usize,
    pub total_events: u64,
    pub buys: usize,
    pub sells: usize,
    /// Distinct user ids, ignoring the `"unknown"` placeholder.
    pub unique_users: usize,
    /// Distinct fund ids, ignoring the `"unknown"` placeholder.
    pub unique_funds: usize,
    pub newest_timestamp: Option<i64>,
    pub oldest_timestamp: Option<i64>,
}

const UNKNOWN_PARTICIPANT: &str = "unknown";

/// Queries over the latest store snapshot.
#[derive(Debug, Clone)]
pub struct EventQuery {
    source: watch::Receiver<StoreSnapshot>,
}

impl EventQuery {
    /// Follows the engine's published snapshots.
    #[must_use]
    pub fn new(source: watch::Receiver<StoreSnapshot>) -> Self {
        Self { source }
    }

    /// Queries a fixed snapshot, e.g. one read from the cache file.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let (_tx, rx) = watch::channel(snapshot);
        Self { source: rx }
    }

    /// Current snapshot; cheap, the record list is shared.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.source.borrow().clone()
    }

    /// Up to `limit` records, most recent first, optionally only those whose
    /// user or fund is `address`.
    #[must_use]
    pub fn list_recent(&self, limit: usize, address: Option<&str>) -> Vec<TradeRecord> {
        let snapshot = self.snapshot();
        snapshot
            .events
            .iter()
            .filter(|r| address.map_or(true, |a| r.involves(a)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Up to `limit` records, oldest first.
    #[must_use]
    pub fn list_chronological(&self, limit: usize, address: Option<&str>) -> Vec<TradeRecord> {
        let snapshot = self.snapshot();
        snapshot
            .events
            .iter()
            .rev()
            .filter(|r| address.map_or(true, |a| r.involves(a)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Pages through records most recent first. `cursor` is the signature of
    /// the last record of the previous page.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidQuery` for a zero page size and
    /// `MonitorError::CursorNotFound` if the cursor is not in the cache
    /// (e.g. it has been evicted).
    pub fn cursor_page(&self, cursor: Option<&str>, page_size: usize) -> Result<Page> {
        self.page_where(None, cursor, page_size)
    }

    /// Same as [`EventQuery::cursor_page`] over only the records whose user
    /// or fund is `address`. The cursor must name one of those records.
    ///
    /// # Errors
    ///
    /// As for [`EventQuery::cursor_page`].
    pub fn address_page(
        &self,
        address: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page> {
        self.page_where(Some(address), cursor, page_size)
    }

    fn page_where(
        &self,
        address: Option<&str>,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page> {
        if page_size == 0 {
            return Err(MonitorError::InvalidQuery(
                "page size must be at least 1".to_string(),
            ));
        }
        let snapshot = self.snapshot();
        let events: Vec<&TradeRecord> = snapshot
            .events
            .iter()
            .filter(|r| address.map_or(true, |a| r.involves(a)))
            .collect();

        let start = match cursor {
            None => 0,
            Some(cursor) => {
                events
                    .iter()
                    .position(|r| r.signature == cursor)
                    .ok_or_else(|| MonitorError::CursorNotFound(cursor.to_string()))?
                    + 1
            }
        };

        let records: Vec<TradeRecord> = events
            .iter()
            .skip(start)
            .take(page_size)
            .map(|r| (*r).clone())
            .collect();
        Ok(page_from(records, page_size))
    }

    /// Counts over the cached records.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let snapshot = self.snapshot();
        let events = snapshot.events.as_slice();

        let participants = |field: fn(&TradeRecord) -> &str| {
            events
                .iter()
                .map(field)
                .filter(|id| *id != UNKNOWN_PARTICIPANT)
                .collect::<HashSet<_>>()
                .len()
        };
        let buys = events
            .iter()
            .filter(|r| r.trade_type == TradeType::Buy)
            .count();

        StoreStats {
            cached: events.len(),
            total_events: snapshot.state.total_events,
            buys,
            sells: events.len() - buys,
            unique_users: participants(|r| r.user_id.as_str()),
            unique_funds: participants(|r| r.fund_id.as_str()),
            newest_timestamp: events.iter().map(|r| r.timestamp).max(),
            oldest_timestamp: events.iter().map(|r| r.timestamp).min(),
        }
    }
}

fn page_from(records: Vec<TradeRecord>, page_size: usize) -> Page {
    let has_more = records.len() == page_size;
    Page {
        next_cursor: records.last().map(|r| r.signature.clone()),
        records,
        has_more,
    }
}

/// Live query over the transactions of an arbitrary account, bypassing the
/// cache. Uses the same scanner as the sync engine.
pub struct AddressQuery {
    fetcher: Fetcher,
    scanner: LogScanner,
}

impl AddressQuery {
    #[must_use]
    pub fn new(fetcher: Fetcher, scanner: LogScanner) -> Self {
        Self { fetcher, scanner }
    }

    /// Lists up to `page_size` signatures for `address` older than `cursor`,
    /// and decodes the trade events in them.
    ///
    /// The cursor of the returned page is the last *listed* signature, so
    /// transactions without events still advance the walk. Individual fetch
    /// failures are skipped as in the sync engine.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidPublicKey` for a bad address,
    /// `MonitorError::InvalidQuery` for a zero page size, or the listing error.
    pub async fn page(
        &self,
        address: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page> {
        if page_size == 0 {
            return Err(MonitorError::InvalidQuery(
                "page size must be at least 1".to_string(),
            ));
        }
        let address = Pubkey::from_str(address)?;
        let listed = self
            .fetcher
            .list_signatures(&address, cursor, page_size)
            .await?;

        let mut records = Vec::new();
        for outcome in self.fetcher.fetch_page(&listed).await {
            if let FetchOutcome::Fetched(detail) = outcome {
                let ctx = TxContext {
                    signature: detail.signature,
                    slot: detail.slot,
                    block_time: detail.block_time,
                };
                records.extend(self.scanner.scan(&detail.logs, &ctx));
            }
        }

        Ok(Page {
            records,
            next_cursor: listed.last().map(|info| info.signature.clone()),
            has_more: listed.len() == page_size,
        })
    }
}
