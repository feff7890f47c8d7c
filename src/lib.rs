//! `trade-event-monitor` - discovers Anchor `TradeEvent` logs emitted by a
//! Solana trade logging program and keeps them in a deduplicated JSON cache.
//!
//! # Architecture
//!
//! 1. **Event codec** ([`types::events`]) - discriminator and borsh body of `TradeEvent`
//! 2. **`LogScanner`** - finds `Program data:` payloads and decodes registered events
//! 3. **`Fetcher`** - lists program signatures and fetches logs with bounded concurrency
//! 4. **`SyncEngine`** - runs poll cycles: list, fetch, scan, merge, advance cursor, persist
//! 5. **`EventStore`** - signature-unique records plus sync state, written atomically
//! 6. **`EventQuery`** - recent/chronological listings, cursor pages and stats
//!
//! # Quick Start
//!
//! ```no_run
//! use trade_event_monitor::{MonitorConfigBuilder, SyncEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfigBuilder::from_env()?
//!         .with_poll_interval(30)
//!         .build()?;
//!
//!     let engine = SyncEngine::new(&config)?;
//!     let token = CancellationToken::new();
//!     engine.run(token).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub use config::{CommitmentLevel, MonitorConfig, MonitorConfigBuilder, TimestampPolicy};
pub use crate::core::engine::{CycleReport, SyncEngine};
pub use crate::core::fetcher::{FetchOutcome, Fetcher, SignatureInfo, TransactionDetail};
pub use crate::core::log_registry::LogDecoderRegistry;
pub use crate::core::scanner::{invokes_program, LogScanner, PROGRAM_DATA_PREFIX};
pub use query::{AddressQuery, EventQuery, Page, StoreStats};
pub use report::StatusReport;
pub use storage::{CacheFile, EventStore, StoreSnapshot, SyncState};
pub use types::events::{calculate_discriminator, EventDiscriminator, TradeEvent, TradeType};
pub use types::record::{TradeRecord, TxContext};
pub use types::traits::{DynamicLogDecoder, LogDecoder, RecordEvent, TradeEventDecoder};
pub use utils::error::{MonitorError, Result};

pub mod config;
pub mod core;
pub mod query;
pub mod report;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod utils;
