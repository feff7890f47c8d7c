//! Human-readable status report of a cache file.

use crate::query::{EventQuery, StoreStats};
use crate::storage::{StoreSnapshot, SyncState};
use crate::types::record::TradeRecord;
use chrono::DateTime;
use colored::Colorize;
use std::fmt::Write;

const RECENT_EVENTS: usize = 5;

/// Everything the `status` command prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: SyncState,
    pub stats: StoreStats,
    pub recent: Vec<TradeRecord>,
    /// Whole hours and leftover minutes since `monitorStartTime`.
    pub run_time: (i64, i64),
}

impl StatusReport {
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot, now_ms: i64) -> Self {
        let state = snapshot.state.clone();
        let query = EventQuery::from_snapshot(snapshot);
        let elapsed_mins = (now_ms - state.monitor_start_time).max(0) / 60_000;
        Self {
            stats: query.stats(),
            recent: query.list_recent(RECENT_EVENTS, None),
            run_time: (elapsed_mins / 60, elapsed_mins % 60),
            state,
        }
    }

    /// Renders the report with ANSI colors (honours `NO_COLOR` via `colored`).
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "═".repeat(60);

        let _ = writeln!(out, "{}", rule.bright_blue());
        let _ = writeln!(out, "{}", "  Trade Monitor Status".bright_cyan().bold());
        let _ = writeln!(out, "{}", rule.bright_blue());
        let _ = writeln!(
            out,
            "  {} {}",
            "Started:       ".bright_white(),
            format_ms(self.state.monitor_start_time)
        );
        let _ = writeln!(
            out,
            "  {} {}",
            "Last update:   ".bright_white(),
            format_ms(self.state.last_update)
        );
        let _ = writeln!(
            out,
            "  {} {}h {}m",
            "Run time:      ".bright_white(),
            self.run_time.0,
            self.run_time.1
        );
        let _ = writeln!(
            out,
            "  {} {}",
            "Total events:  ".bright_white(),
            self.stats.total_events.to_string().cyan()
        );
        let _ = writeln!(
            out,
            "  {} {}",
            "Cached events: ".bright_white(),
            self.stats.cached.to_string().cyan()
        );
        let _ = writeln!(
            out,
            "  {} {}",
            "Last signature:".bright_white(),
            self.state.last_signature.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            out,
            "  {} {} buy / {} sell",
            "Trades:        ".bright_white(),
            self.stats.buys.to_string().green(),
            self.stats.sells.to_string().red()
        );
        let _ = writeln!(
            out,
            "  {} {} users / {} funds",
            "Participants:  ".bright_white(),
            self.stats.unique_users,
            self.stats.unique_funds
        );

        if !self.recent.is_empty() {
            let _ = writeln!(out, "\n  {}", "Recent events".bright_white().bold());
            for record in &self.recent {
                let side = match record.trade_type {
                    crate::types::events::TradeType::Buy => record.trade_type.label().green(),
                    crate::types::events::TradeType::Sell => record.trade_type.label().red(),
                };
                let _ = writeln!(
                    out,
                    "  {} {:>4} {} @ {} │ user {} │ {}",
                    format_secs(record.timestamp).bright_black(),
                    side,
                    record.amount,
                    record.price,
                    short(&record.user_id),
                    short(&record.signature).bright_black()
                );
            }
        }
        let _ = writeln!(out, "{}", rule.bright_blue());
        out
    }
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn format_secs(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(
        || secs.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn short(value: &str) -> String {
    if value.chars().count() <= 12 {
        value.to_string()
    } else {
        let head: String = value.chars().take(8).collect();
        format!("{head}…")
    }
}
