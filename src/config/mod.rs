//! Configuration management for the trade monitor.
//!
//! Configuration is assembled with [`MonitorConfigBuilder`]; the
//! [`MonitorConfigBuilder::from_env`] entry point seeds the builder from
//! `MONITOR_*` environment variables so the CLI can layer overrides on top.

use crate::utils::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;

/// Public devnet endpoint used when no RPC URL is configured.
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
/// Trade logging program watched by default.
pub const DEFAULT_PROGRAM_ADDRESS: &str = "EAJ7QiDXgXH31m57RhDFMHTkBrDzxrFpcN8xUkPUqHLi";
pub const DEFAULT_CACHE_DIR: &str = "./cache";
pub const DEFAULT_CACHE_FILE: &str = "trading-events.json";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
const DEFAULT_MAX_CACHE_EVENTS: usize = 1000;
const DEFAULT_BATCH_DELAY_MS: u64 = 100;
/// `getSignaturesForAddress` refuses limits above this.
const MAX_BATCH_SIZE: usize = 1000;

/// Transaction commitment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl From<CommitmentLevel> for solana_sdk::commitment_config::CommitmentConfig {
    fn from(level: CommitmentLevel) -> Self {
        match level {
            CommitmentLevel::Processed => {
                solana_sdk::commitment_config::CommitmentConfig::processed()
            }
            CommitmentLevel::Confirmed => {
                solana_sdk::commitment_config::CommitmentConfig::confirmed()
            }
            CommitmentLevel::Finalized => {
                solana_sdk::commitment_config::CommitmentConfig::finalized()
            }
        }
    }
}

impl FromStr for CommitmentLevel {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(MonitorError::ConfigError(format!(
                "Unknown commitment level '{other}'"
            ))),
        }
    }
}

/// Rules for trusting the timestamp embedded in an event payload.
///
/// Block time always wins. The embedded value is only used when block time is
/// missing, `fallback_to_embedded` is set and the value looks like seconds
/// since the epoch: positive, at most `max_plausible_secs` (larger values are
/// almost certainly milliseconds) and no more than `max_future_skew_secs`
/// ahead of the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPolicy {
    pub fallback_to_embedded: bool,
    pub max_plausible_secs: i64,
    pub max_future_skew_secs: i64,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self {
            fallback_to_embedded: true,
            max_plausible_secs: 100_000_000_000,
            max_future_skew_secs: 86_400,
        }
    }
}

/// Configuration for the trade monitor.
///
/// Use [`MonitorConfigBuilder`] to construct instances of this struct.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// RPC endpoint URL
    pub rpc_url: String,

    /// Program whose signatures are polled
    pub program_id: Pubkey,

    /// Directory holding the cache file
    pub cache_dir: PathBuf,

    /// Cache file name inside `cache_dir`
    pub cache_file: String,

    /// Polling interval in seconds (default: 60)
    pub poll_interval_secs: u64,

    /// Signatures requested per page (default: 50)
    pub batch_size: usize,

    /// Concurrent transaction fetches per page (default: 5)
    pub concurrency_limit: usize,

    /// Pause between concurrent fetch chunks in milliseconds (default: 100)
    pub batch_delay_ms: u64,

    /// Eviction cap for the live event collection (default: 1000)
    pub max_cache_events: usize,

    /// Desired commitment level (default: Confirmed)
    pub commitment_level: CommitmentLevel,

    /// Embedded timestamp sanity rules
    pub timestamp_policy: TimestampPolicy,

    /// Log filter handed to the tracing subscriber (default: "info")
    pub log_level: String,
}

impl MonitorConfig {
    /// Full path of the JSON cache file.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file)
    }

    /// Loads configuration from the process environment with defaults for
    /// every unset variable.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigError` when a variable is set but invalid.
    pub fn from_env() -> Result<Self> {
        MonitorConfigBuilder::from_env()?.build()
    }
}

/// Builder for creating `MonitorConfig` instances.
///
/// # Example
///
/// ```
/// # use trade_event_monitor::MonitorConfigBuilder;
/// let config = MonitorConfigBuilder::new()
///     .with_rpc("http://127.0.0.1:8899")
///     .program_id("11111111111111111111111111111111")
///     .with_batch_size(25)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 25);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MonitorConfigBuilder {
    rpc_url: Option<String>,
    program_id: Option<String>,
    cache_dir: Option<PathBuf>,
    cache_file: Option<String>,
    poll_interval_secs: Option<u64>,
    batch_size: Option<usize>,
    concurrency_limit: Option<usize>,
    batch_delay_ms: Option<u64>,
    max_cache_events: Option<usize>,
    commitment_level: Option<CommitmentLevel>,
    timestamp_policy: Option<TimestampPolicy>,
    log_level: Option<String>,
}

impl MonitorConfigBuilder {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a builder from `MONITOR_*` environment variables, filling in the
    /// documented defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigError` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorConfigBuilder::from_env`] but reads through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigError` if a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut policy = TimestampPolicy::default();
        if let Some(v) = parse_var(&get, "MONITOR_MAX_EMBEDDED_TIMESTAMP")? {
            policy.max_plausible_secs = v;
        }
        if let Some(v) = parse_var(&get, "MONITOR_MAX_FUTURE_SKEW_SECONDS")? {
            policy.max_future_skew_secs = v;
        }

        Ok(Self {
            rpc_url: Some(get("MONITOR_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string())),
            program_id: Some(
                get("MONITOR_PROGRAM_ADDRESS")
                    .unwrap_or_else(|| DEFAULT_PROGRAM_ADDRESS.to_string()),
            ),
            cache_dir: Some(
                get("MONITOR_CACHE_DIR")
                    .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string())
                    .into(),
            ),
            cache_file: Some(
                get("MONITOR_CACHE_FILE").unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string()),
            ),
            poll_interval_secs: parse_var(&get, "MONITOR_INTERVAL_SECONDS")?,
            batch_size: parse_var(&get, "MONITOR_BATCH_SIZE")?,
            concurrency_limit: parse_var(&get, "MONITOR_CONCURRENCY_LIMIT")?,
            batch_delay_ms: parse_var(&get, "MONITOR_BATCH_DELAY_MS")?,
            max_cache_events: parse_var(&get, "MONITOR_MAX_CACHE_EVENTS")?,
            commitment_level: get("MONITOR_COMMITMENT")
                .map(|v| v.parse())
                .transpose()?,
            timestamp_policy: Some(policy),
            log_level: get("MONITOR_LOG_LEVEL"),
        })
    }

    /// Sets the RPC endpoint URL.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// Sets the program ID to monitor (base58).
    #[must_use]
    pub fn program_id(mut self, id: impl Into<String>) -> Self {
        self.program_id = Some(id.into());
        self
    }

    /// Sets the directory that holds the cache file.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the cache file name.
    #[must_use]
    pub fn with_cache_file(mut self, file: impl Into<String>) -> Self {
        self.cache_file = Some(file.into());
        self
    }

    /// Sets the polling interval in seconds.
    #[must_use]
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        self
    }

    /// Sets the number of signatures requested per page.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets how many transaction fetches run at once.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Sets the pause between fetch chunks.
    #[must_use]
    pub fn with_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.batch_delay_ms = Some(delay_ms);
        self
    }

    /// Sets the maximum number of events kept in the cache.
    #[must_use]
    pub fn with_max_cache_events(mut self, max: usize) -> Self {
        self.max_cache_events = Some(max);
        self
    }

    /// Sets the commitment level for RPC queries.
    #[must_use]
    pub fn with_commitment(mut self, level: CommitmentLevel) -> Self {
        self.commitment_level = Some(level);
        self
    }

    /// Sets the embedded timestamp policy.
    #[must_use]
    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = Some(policy);
        self
    }

    /// Sets the log filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigError` if the RPC URL or program ID is
    /// missing, the program ID is not a valid public key, or a numeric
    /// setting is out of range.
    pub fn build(self) -> Result<MonitorConfig> {
        let rpc_url = self
            .rpc_url
            .ok_or_else(|| MonitorError::ConfigError("RPC URL is required".to_string()))?;

        let program_id_str = self
            .program_id
            .ok_or_else(|| MonitorError::ConfigError("Program ID is required".to_string()))?;
        let program_id = Pubkey::from_str(&program_id_str).map_err(|e| {
            MonitorError::ConfigError(format!("Invalid program ID '{program_id_str}': {e}"))
        })?;

        let poll_interval_secs = self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(MonitorError::ConfigError(
                "Poll interval must be at least 1 second".to_string(),
            ));
        }

        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(MonitorError::ConfigError(format!(
                "Batch size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let concurrency_limit = self.concurrency_limit.unwrap_or(DEFAULT_CONCURRENCY_LIMIT);
        if concurrency_limit == 0 {
            return Err(MonitorError::ConfigError(
                "Concurrency limit must be at least 1".to_string(),
            ));
        }

        let max_cache_events = self.max_cache_events.unwrap_or(DEFAULT_MAX_CACHE_EVENTS);
        if max_cache_events == 0 {
            return Err(MonitorError::ConfigError(
                "Max cache events must be at least 1".to_string(),
            ));
        }

        Ok(MonitorConfig {
            rpc_url,
            program_id,
            cache_dir: self
                .cache_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            cache_file: self
                .cache_file
                .unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string()),
            poll_interval_secs,
            batch_size,
            concurrency_limit,
            batch_delay_ms: self.batch_delay_ms.unwrap_or(DEFAULT_BATCH_DELAY_MS),
            max_cache_events,
            commitment_level: self.commitment_level.unwrap_or_default(),
            timestamp_policy: self.timestamp_policy.unwrap_or_default(),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                MonitorError::ConfigError(format!("Invalid value '{raw}' for {key}: {e}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_missing_required_fields() {
        let result = MonitorConfigBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_invalid_program_id() {
        let result = MonitorConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .program_id("invalid_pubkey")
            .build();

        match result {
            Err(MonitorError::ConfigError(msg)) => assert!(msg.contains("Invalid program ID")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_defaults() -> Result<()> {
        let config = MonitorConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .program_id("11111111111111111111111111111111")
            .build()?;

        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.batch_delay_ms, 100);
        assert_eq!(config.max_cache_events, 1000);
        assert_eq!(config.commitment_level, CommitmentLevel::Confirmed);
        assert_eq!(
            config.cache_path(),
            PathBuf::from("./cache").join("trading-events.json")
        );
        Ok(())
    }

    #[test]
    fn test_builder_rejects_out_of_range_values() {
        let base = MonitorConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .program_id("11111111111111111111111111111111");

        assert!(base.clone().with_batch_size(0).build().is_err());
        assert!(base.clone().with_batch_size(1001).build().is_err());
        assert!(base.clone().with_concurrency_limit(0).build().is_err());
        assert!(base.clone().with_poll_interval(0).build().is_err());
        assert!(base.with_max_cache_events(0).build().is_err());
    }

    #[test]
    fn test_from_lookup_defaults() -> Result<()> {
        let config = MonitorConfigBuilder::from_lookup(lookup(&[]))?.build()?;
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ADDRESS);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timestamp_policy, TimestampPolicy::default());
        Ok(())
    }

    #[test]
    fn test_from_lookup_overrides() -> Result<()> {
        let config = MonitorConfigBuilder::from_lookup(lookup(&[
            ("MONITOR_RPC_URL", "http://localhost:8899"),
            ("MONITOR_PROGRAM_ADDRESS", "11111111111111111111111111111111"),
            ("MONITOR_CACHE_DIR", "/tmp/trades"),
            ("MONITOR_INTERVAL_SECONDS", "15"),
            ("MONITOR_BATCH_SIZE", "20"),
            ("MONITOR_CONCURRENCY_LIMIT", "3"),
            ("MONITOR_MAX_CACHE_EVENTS", "200"),
            ("MONITOR_COMMITMENT", "finalized"),
            ("MONITOR_MAX_FUTURE_SKEW_SECONDS", "60"),
            ("MONITOR_LOG_LEVEL", "debug"),
        ]))?
        .with_batch_size(30)
        .build()?;

        assert_eq!(config.rpc_url, "http://localhost:8899");
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/trades/trading-events.json"));
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.batch_size, 30);
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.max_cache_events, 200);
        assert_eq!(config.commitment_level, CommitmentLevel::Finalized);
        assert_eq!(config.timestamp_policy.max_future_skew_secs, 60);
        assert_eq!(config.log_level, "debug");
        Ok(())
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let result =
            MonitorConfigBuilder::from_lookup(lookup(&[("MONITOR_BATCH_SIZE", "fifty")]));
        match result {
            Err(MonitorError::ConfigError(msg)) => assert!(msg.contains("MONITOR_BATCH_SIZE")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
