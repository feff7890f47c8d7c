//! Counters for the event decoder registry.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time copy of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub registered: usize,
    pub lookups: u64,
    pub hits: u64,
    pub decode_failures: u64,
}

/// Registration count, capacity limit and decode counters of a registry.
///
/// Counters use relaxed atomics so the scanner can update them through `&self`.
#[derive(Debug)]
pub struct RegistryMetrics {
    registered_count: AtomicUsize,
    /// Payload lines whose discriminator was looked up.
    lookups: AtomicU64,
    /// Lookups that decoded into an event.
    hits: AtomicU64,
    /// Lookups that matched a discriminator but failed structural decode.
    decode_failures: AtomicU64,
    /// Maximum number of decoders (0 = unlimited).
    pub capacity_limit: usize,
    pub name: &'static str,
}

impl RegistryMetrics {
    /// Creates a metrics instance; `capacity_limit` of 0 means unlimited.
    #[must_use]
    pub fn new(name: &'static str, capacity_limit: usize) -> Self {
        Self {
            registered_count: AtomicUsize::new(0),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            capacity_limit,
            name,
        }
    }

    /// `true` if the registry has a limit and one more registration would exceed it.
    #[must_use]
    pub fn is_full(&self) -> bool {
        if self.capacity_limit == 0 {
            return false;
        }
        self.registered_count.load(Ordering::Relaxed) >= self.capacity_limit
    }

    pub fn inc_registered(&self) {
        self.registered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lookups(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registered: self.registered_count.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }

    /// Reports current metrics at debug level.
    pub fn report(&self) {
        let snap = self.snapshot();
        let limit_str = if self.capacity_limit == 0 {
            "unlimited".to_string()
        } else {
            self.capacity_limit.to_string()
        };

        crate::utils::logging::log(
            crate::utils::logging::LogLevel::Debug,
            &format!(
                "Registry [{}] Stats: {}/{} decoders | Lookups: {} | Hits: {} | Failures: {}",
                self.name,
                snap.registered,
                limit_str,
                snap.lookups,
                snap.hits,
                snap.decode_failures
            ),
        );
    }
}
