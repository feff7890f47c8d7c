pub mod engine;
pub mod fetcher;
pub mod log_registry;
pub mod registry_metrics;
pub mod scanner;

pub use engine::{CycleReport, SyncEngine};
pub use fetcher::{FetchOutcome, Fetcher, SignatureInfo, TransactionDetail};
pub use log_registry::LogDecoderRegistry;
pub use scanner::LogScanner;
