//! Event decoder registry keyed by Anchor discriminator.
//!
//! The scanner asks the registry for the decoder owning a payload's first
//! eight bytes, so new event kinds are added by registration rather than by
//! touching the scan loop.

use crate::core::registry_metrics::RegistryMetrics;
use crate::types::events::TradeEvent;
use crate::types::traits::{DynamicLogDecoder, LogDecoder, TradeEventDecoder};
use crate::utils::error::{MonitorError, Result};
use std::collections::HashMap;

/// Registry for managing event decoders by discriminator.
pub struct LogDecoderRegistry {
    decoders: HashMap<[u8; 8], Box<dyn DynamicLogDecoder>>,
    metrics: RegistryMetrics,
}

impl LogDecoderRegistry {
    /// Creates an empty registry with unlimited capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::new_bounded(0)
    }

    /// Creates an empty registry holding at most `capacity` decoders (0 = unlimited).
    #[must_use]
    pub fn new_bounded(capacity: usize) -> Self {
        Self {
            decoders: HashMap::new(),
            metrics: RegistryMetrics::new("EventDecoder", capacity),
        }
    }

    /// Registry preloaded with the `TradeEvent` decoder.
    #[must_use]
    pub fn with_trade_events() -> Self {
        let mut registry = Self::new();
        let decoder: Box<dyn LogDecoder<TradeEvent>> = Box::new(TradeEventDecoder);
        registry.decoders.insert(
            DynamicLogDecoder::discriminator(&decoder),
            Box::new(decoder),
        );
        registry.metrics.inc_registered();
        registry
    }

    /// Registers a decoder under its own discriminator.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::RegistryCapacityExceeded` if the registry is
    /// full, or `MonitorError::ConfigError` if another decoder already owns
    /// the discriminator.
    pub fn register(&mut self, decoder: Box<dyn DynamicLogDecoder>) -> Result<()> {
        let discriminator = decoder.discriminator();
        if let Some(existing) = self.decoders.get(&discriminator) {
            return Err(MonitorError::ConfigError(format!(
                "discriminator of {} already registered by {}",
                decoder.event_name(),
                existing.event_name()
            )));
        }
        if self.metrics.is_full() {
            return Err(MonitorError::RegistryCapacityExceeded(format!(
                "EventDecoder registry full (limit: {})",
                self.metrics.capacity_limit
            )));
        }

        self.decoders.insert(discriminator, decoder);
        self.metrics.inc_registered();
        Ok(())
    }

    /// Looks up the decoder for a discriminator, counting the lookup.
    #[must_use]
    pub fn lookup(&self, discriminator: &[u8; 8]) -> Option<&dyn DynamicLogDecoder> {
        self.metrics.inc_lookups();
        self.decoders.get(discriminator).map(|decoder| &**decoder)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Returns the metrics for this registry.
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }
}

impl Default for LogDecoderRegistry {
    fn default() -> Self {
        Self::with_trade_events()
    }
}
