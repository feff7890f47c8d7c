//! Decoder traits used by the log scanner's registry.

use crate::types::events::{EventDiscriminator, TradeEvent};
use crate::types::record::{TradeRecord, TxContext};
use crate::utils::error::Result;

/// Generic log decoder trait for custom parsing logic.
///
/// Implementors turn the bytes that follow an event discriminator into a
/// typed event.
pub trait LogDecoder<T>: Send + Sync {
    /// Decodes an event body.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::DecodingError` when the body is malformed.
    fn decode(&self, body: &[u8]) -> Result<T>;
}

/// A decoded event that can become a cache record.
pub trait RecordEvent: Send {
    /// Timestamp carried inside the payload, if the event has one.
    fn embedded_timestamp(&self) -> Option<i64>;

    /// Builds the stored record. `timestamp` has already been resolved by
    /// the scanner.
    fn into_record(self: Box<Self>, ctx: &TxContext, timestamp: i64, parsed_at: i64)
        -> TradeRecord;
}

/// Type-erased log decoder for the registry.
pub trait DynamicLogDecoder: Send + Sync {
    /// Event name, for logs and metrics.
    fn event_name(&self) -> &'static str;

    /// Discriminator this decoder claims.
    fn discriminator(&self) -> [u8; 8];

    /// Decodes an event body into a record-capable event.
    ///
    /// # Errors
    ///
    /// Propagates the typed decoder's error.
    fn decode_dynamic(&self, body: &[u8]) -> Result<Box<dyn RecordEvent>>;
}

impl<T> DynamicLogDecoder for Box<dyn LogDecoder<T>>
where
    T: EventDiscriminator + RecordEvent + 'static,
{
    fn event_name(&self) -> &'static str {
        T::NAME
    }

    fn discriminator(&self) -> [u8; 8] {
        T::discriminator()
    }

    fn decode_dynamic(&self, body: &[u8]) -> Result<Box<dyn RecordEvent>> {
        Ok(Box::new(self.decode(body)?))
    }
}

/// Borsh decoder for [`TradeEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TradeEventDecoder;

impl LogDecoder<TradeEvent> for TradeEventDecoder {
    fn decode(&self, body: &[u8]) -> Result<TradeEvent> {
        TradeEvent::decode(body)
    }
}

impl RecordEvent for TradeEvent {
    fn embedded_timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }

    fn into_record(
        self: Box<Self>,
        ctx: &TxContext,
        timestamp: i64,
        parsed_at: i64,
    ) -> TradeRecord {
        let event = *self;
        TradeRecord {
            signature: ctx.signature.clone(),
            block_time: ctx.block_time.unwrap_or(0),
            slot: ctx.slot,
            id: event.id,
            user_id: event.user_id,
            fund_id: event.fund_id,
            trade_type: event.trade_type,
            amount: event.amount,
            price: event.price,
            timestamp,
            parsed_at,
        }
    }
}
