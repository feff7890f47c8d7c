//! Log scanner: finds `Program data:` payloads in a transaction's log lines
//! and turns the ones with a registered discriminator into trade records.

use crate::config::TimestampPolicy;
use crate::core::log_registry::LogDecoderRegistry;
use crate::types::record::{TradeRecord, TxContext};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Prefix of the log lines Anchor uses for emitted events.
pub const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Decodes event records out of raw transaction logs.
///
/// A malformed line never aborts the scan: undecodable base64, short buffers
/// and unknown discriminators are skipped quietly, and a payload that matches
/// a discriminator but fails to decode is skipped with a warning.
///
/// # Example
///
/// ```
/// use trade_event_monitor::{LogScanner, TxContext};
///
/// let scanner = LogScanner::default();
/// let ctx = TxContext { signature: "sig".into(), slot: 1, block_time: Some(1_700_000_000) };
/// let logs = vec!["Program log: Instruction: LogTrade".to_string()];
/// assert!(scanner.scan(&logs, &ctx).is_empty());
/// ```
pub struct LogScanner {
    registry: LogDecoderRegistry,
    policy: TimestampPolicy,
}

impl LogScanner {
    #[must_use]
    pub fn new(registry: LogDecoderRegistry, policy: TimestampPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &LogDecoderRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &TimestampPolicy {
        &self.policy
    }

    /// Scans `logs` using the local clock for `parsedAt` and the future-skew check.
    #[must_use]
    pub fn scan(&self, logs: &[String], ctx: &TxContext) -> Vec<TradeRecord> {
        self.scan_at(logs, ctx, chrono::Utc::now().timestamp_millis())
    }

    /// Scans `logs` as if the wall clock read `now_ms`.
    #[must_use]
    pub fn scan_at(&self, logs: &[String], ctx: &TxContext, now_ms: i64) -> Vec<TradeRecord> {
        if !has_program_data(logs) {
            return Vec::new();
        }

        let mut records = Vec::new();
        for line in logs {
            let Some(encoded) = line.strip_prefix(PROGRAM_DATA_PREFIX) else {
                continue;
            };
            let Ok(bytes) = STANDARD.decode(encoded.trim()) else {
                tracing::debug!(signature = %ctx.signature, "Skipping non-base64 program data");
                continue;
            };
            if bytes.len() < 8 {
                continue;
            }

            let mut discriminator = [0u8; 8];
            discriminator.copy_from_slice(&bytes[..8]);
            let Some(decoder) = self.registry.lookup(&discriminator) else {
                continue;
            };

            match decoder.decode_dynamic(&bytes[8..]) {
                Ok(event) => {
                    self.registry.metrics().inc_hits();
                    let timestamp = resolve_timestamp(
                        &self.policy,
                        ctx.block_time,
                        event.embedded_timestamp(),
                        now_ms,
                    );
                    records.push(event.into_record(ctx, timestamp, now_ms));
                }
                Err(e) => {
                    self.registry.metrics().inc_decode_failures();
                    tracing::warn!(
                        signature = %ctx.signature,
                        event = decoder.event_name(),
                        error = %e,
                        "Matched event discriminator but payload did not decode"
                    );
                }
            }
        }
        records
    }
}

impl Default for LogScanner {
    fn default() -> Self {
        Self::new(LogDecoderRegistry::default(), TimestampPolicy::default())
    }
}

/// Cheap pre-check before any base64 work.
#[must_use]
pub fn has_program_data(logs: &[String]) -> bool {
    logs.iter().any(|line| line.starts_with(PROGRAM_DATA_PREFIX))
}

/// Whether the logs show `program_id` being invoked at any depth.
#[must_use]
pub fn invokes_program(logs: &[String], program_id: &str) -> bool {
    let needle = format!("Program {program_id} invoke");
    logs.iter().any(|line| line.starts_with(&needle))
}

/// Picks the record timestamp in seconds.
///
/// Block time wins whenever it is present and positive. Otherwise the
/// embedded value is used only if the policy allows it and it passes
/// [`is_plausible_seconds`]; failing that, the local clock is used.
#[must_use]
pub fn resolve_timestamp(
    policy: &TimestampPolicy,
    block_time: Option<i64>,
    embedded: Option<i64>,
    now_ms: i64,
) -> i64 {
    let now_secs = now_ms.div_euclid(1000);
    if let Some(block_time) = block_time.filter(|t| *t > 0) {
        return block_time;
    }
    match embedded {
        Some(ts)
            if policy.fallback_to_embedded && is_plausible_seconds(policy, ts, now_secs) =>
        {
            ts
        }
        Some(ts) => {
            tracing::debug!(embedded = ts, "Ignoring implausible embedded timestamp");
            now_secs
        }
        None => now_secs,
    }
}

/// Rejects non-positive values, values too large to be seconds, and values
/// beyond the allowed future skew.
#[must_use]
pub fn is_plausible_seconds(policy: &TimestampPolicy, ts: i64, now_secs: i64) -> bool {
    ts > 0
        && ts <= policy.max_plausible_secs
        && ts <= now_secs.saturating_add(policy.max_future_skew_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::{TradeEvent, TradeType};

    const NOW_MS: i64 = 1_760_000_000_000;

    fn ctx(block_time: Option<i64>) -> TxContext {
        TxContext {
            signature: "5j7s6NiJS3JAkvgkoc18WVAsiSaci2pxB2A6ueCJP4tprA2TFg9wSyTLeYouxPBJEMzJinENTkpA52YStRW5Dia7".to_string(),
            slot: 42,
            block_time,
        }
    }

    fn event(id: &str, timestamp: i64) -> TradeEvent {
        TradeEvent {
            id: id.to_string(),
            user_id: "user".to_string(),
            fund_id: "fund".to_string(),
            trade_type: TradeType::Buy,
            amount: 100,
            price: 150_000,
            timestamp,
        }
    }

    fn data_line(event: &TradeEvent) -> String {
        format!(
            "{PROGRAM_DATA_PREFIX}{}",
            STANDARD.encode(event.encode_with_discriminator().unwrap())
        )
    }

    #[test]
    fn test_block_time_overrides_embedded_timestamp() {
        let scanner = LogScanner::default();
        let logs = vec![data_line(&event("1", 1_234))];
        let records = scanner.scan_at(&logs, &ctx(Some(1_700_000_000)), NOW_MS);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, 1_700_000_000);
        assert_eq!(records[0].block_time, 1_700_000_000);
        assert_eq!(records[0].slot, 42);
        assert_eq!(records[0].parsed_at, NOW_MS);
    }

    #[test]
    fn test_truncated_line_is_skipped() {
        let scanner = LogScanner::default();
        let mut truncated = event("2", 0).encode_with_discriminator().unwrap();
        truncated.truncate(20);
        let logs = vec![
            "Program log: Instruction: LogTrade".to_string(),
            data_line(&event("1", 0)),
            format!("{PROGRAM_DATA_PREFIX}{}", STANDARD.encode(truncated)),
        ];
        let records = scanner.scan_at(&logs, &ctx(Some(1_700_000_000)), NOW_MS);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
        assert_eq!(scanner.registry().metrics().snapshot().decode_failures, 1);
    }

    #[test]
    fn test_records_follow_log_order() {
        let scanner = LogScanner::default();
        let logs = vec![data_line(&event("a", 0)), data_line(&event("b", 0))];
        let ids: Vec<_> = scanner
            .scan_at(&logs, &ctx(Some(1)), NOW_MS)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_ignores_noise() {
        let scanner = LogScanner::default();
        let logs = vec![
            "Program data: !!!not-base64".to_string(),
            format!("{PROGRAM_DATA_PREFIX}{}", STANDARD.encode([1, 2, 3])),
            format!("{PROGRAM_DATA_PREFIX}{}", STANDARD.encode([9u8; 40])),
        ];
        assert!(scanner.scan_at(&logs, &ctx(None), NOW_MS).is_empty());
        assert_eq!(scanner.registry().metrics().snapshot().decode_failures, 0);
    }

    #[test]
    fn test_quick_reject() {
        let logs = vec!["Program log: hello".to_string()];
        assert!(!has_program_data(&logs));
        assert!(LogScanner::default().scan(&logs, &ctx(None)).is_empty());
    }

    #[test]
    fn test_embedded_timestamp_fallback() {
        let policy = TimestampPolicy::default();
        // Seconds value without block time is trusted.
        assert_eq!(
            resolve_timestamp(&policy, None, Some(1_700_000_000), NOW_MS),
            1_700_000_000
        );
        // Milliseconds mistaken for seconds fall back to the clock.
        assert_eq!(
            resolve_timestamp(&policy, None, Some(1_753_686_307_322), NOW_MS),
            NOW_MS / 1000
        );
        // Far future falls back to the clock.
        let future = NOW_MS / 1000 + 2 * 86_400;
        assert_eq!(resolve_timestamp(&policy, None, Some(future), NOW_MS), NOW_MS / 1000);
        // Zero block time counts as unknown.
        assert_eq!(resolve_timestamp(&policy, Some(0), Some(5), NOW_MS), 5);

        let strict = TimestampPolicy {
            fallback_to_embedded: false,
            ..policy
        };
        assert_eq!(
            resolve_timestamp(&strict, None, Some(1_700_000_000), NOW_MS),
            NOW_MS / 1000
        );
    }

    #[test]
    fn test_scan_without_block_time_uses_policy() {
        let scanner = LogScanner::default();
        let logs = vec![data_line(&event("ms", 1_753_686_307_322))];
        let records = scanner.scan_at(&logs, &ctx(None), NOW_MS);
        assert_eq!(records[0].timestamp, NOW_MS / 1000);
        assert_eq!(records[0].block_time, 0);
    }

    #[test]
    fn test_invokes_program() {
        let program = "EAJ7QiDXgXH31m57RhDFMHTkBrDzxrFpcN8xUkPUqHLi";
        let logs = vec![
            "Program ComputeBudget111111111111111111111111111111 invoke [1]".to_string(),
            format!("Program {program} invoke [1]"),
            format!("Program {program} success"),
        ];
        assert!(invokes_program(&logs, program));
        assert!(!invokes_program(&logs[..1], program));
    }
}
