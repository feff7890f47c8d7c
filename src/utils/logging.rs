//! Monitor log lines on top of `tracing`.
//!
//! Everything except errors and per-transaction debug lines can be muted by
//! setting `TRADE_MONITOR_SILENT`, which the integration tests do.

use crate::config::MonitorConfig;
use crate::core::engine::CycleReport;

const SILENT_VAR: &str = "TRADE_MONITOR_SILENT";

fn silenced() -> bool {
    std::env::var_os(SILENT_VAR).is_some()
}

#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

pub fn log(level: LogLevel, message: &str) {
    if silenced() {
        return;
    }

    match level {
        LogLevel::Info => tracing::info!("{message}"),
        LogLevel::Success => tracing::info!(status = "ok", "{message}"),
        LogLevel::Warning => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
        LogLevel::Debug => tracing::debug!("{message}"),
    }
}

/// Replaces the value of an `api-key=` query parameter.
#[must_use]
pub fn redact_rpc_url(rpc_url: &str) -> String {
    const KEY: &str = "api-key=";
    let Some(pos) = rpc_url.find(KEY) else {
        return rpc_url.to_string();
    };
    let value_start = pos + KEY.len();
    let value_end = rpc_url[value_start..]
        .find('&')
        .map_or(rpc_url.len(), |i| value_start + i);
    format!(
        "{}[REDACTED]{}",
        &rpc_url[..value_start],
        &rpc_url[value_end..]
    )
}

pub fn log_startup(config: &MonitorConfig) {
    if silenced() {
        return;
    }

    tracing::info!(
        program_id = %config.program_id,
        rpc_url = %redact_rpc_url(&config.rpc_url),
        cache = %config.cache_path().display(),
        poll_interval_s = config.poll_interval_secs,
        batch_size = config.batch_size,
        concurrency = config.concurrency_limit,
        commitment = ?config.commitment_level,
        "Trade monitor starting"
    );
}

pub fn log_transaction(signature: &str, slot: u64, events: usize) {
    tracing::debug!(signature, slot, events, "Scanned transaction");
}

/// One line per cycle that saw signatures; quiet cycles log at debug.
pub fn log_cycle(report: &CycleReport) {
    if report.signatures == 0 {
        tracing::debug!("No new signatures");
        return;
    }
    if silenced() {
        return;
    }
    tracing::info!(
        signatures = report.signatures,
        decoded = report.decoded,
        added = report.added,
        evicted = report.evicted,
        skipped = report.fetch_failures + report.missing,
        duration_ms = report.duration_ms,
        "Cycle complete"
    );
}

pub fn log_shutdown(cached_events: usize) {
    log(
        LogLevel::Success,
        &format!("Cache saved with {cached_events} events"),
    );
}

pub fn log_error(context: &str, error: &str) {
    tracing::error!(context, error, "Monitor error");
}
