//! Event codec for the trade logging program.
//!
//! Anchor emits events as `Program data: <base64>` log lines whose payload is
//! an 8-byte discriminator followed by the borsh-encoded event body.

use crate::utils::error::{MonitorError, Result};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Calculates the 8-byte discriminator for an event type.
///
/// The discriminator is the first 8 bytes of the SHA256 hash of the
/// event name prefixed with "event:". This matches Anchor's event
/// discriminator calculation.
///
/// # Example
///
/// ```
/// use trade_event_monitor::calculate_discriminator;
///
/// let discriminator = calculate_discriminator("TradeEvent");
/// assert_eq!(discriminator, [189, 219, 127, 211, 78, 230, 97, 238]);
/// ```
#[must_use]
pub fn calculate_discriminator(event_name: &str) -> [u8; 8] {
    let preimage = format!("event:{event_name}");
    let hash = Sha256::digest(preimage.as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Trait for event types that carry an Anchor discriminator.
pub trait EventDiscriminator {
    /// Logical event name as declared in the on-chain program.
    const NAME: &'static str;

    /// Returns the 8-byte discriminator for this event type.
    fn discriminator() -> [u8; 8] {
        calculate_discriminator(Self::NAME)
    }
}

/// Side of a trade. Encoded as a single byte tag: 0 = buy, 1 = sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    /// Wire tag of this trade type.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            TradeType::Buy => 0,
            TradeType::Sell => 1,
        }
    }

    /// Upper-case label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl TryFrom<u8> for TradeType {
    type Error = MonitorError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(TradeType::Buy),
            1 => Ok(TradeType::Sell),
            other => Err(MonitorError::DecodingError(format!(
                "unknown trade type tag {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// The cache file stores the trade type as its numeric tag.
impl Serialize for TradeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for TradeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = <u8 as Deserialize>::deserialize(deserializer)?;
        TradeType::try_from(tag).map_err(serde::de::Error::custom)
    }
}

/// Body of the `TradeEvent` emitted by the `log_trade` instruction.
///
/// Field order is the wire order. `timestamp` is whatever the submitting
/// client put in the instruction and is not trusted for record time.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TradeEvent {
    pub id: String,
    pub user_id: String,
    pub fund_id: String,
    pub trade_type: TradeType,
    pub amount: u64,
    pub price: u64,
    pub timestamp: i64,
}

impl EventDiscriminator for TradeEvent {
    const NAME: &'static str = "TradeEvent";
}

impl TradeEvent {
    /// Decodes an event body (the bytes after the discriminator).
    ///
    /// Trailing bytes after the last field are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::DecodingError` if the buffer ends before a
    /// declared field, a string is not UTF-8, or the trade type tag is not 0 or 1.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut cursor = body;
        Self::deserialize(&mut cursor)
            .map_err(|e| MonitorError::DecodingError(format!("TradeEvent: {e}")))
    }

    /// Encodes the event body without the discriminator.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::DecodingError` if borsh serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        borsh::to_vec(self).map_err(|e| MonitorError::DecodingError(e.to_string()))
    }

    /// Encodes discriminator plus body, the exact bytes carried by a
    /// `Program data:` line.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::DecodingError` if borsh serialization fails.
    pub fn encode_with_discriminator(&self) -> Result<Vec<u8>> {
        let mut out = Self::discriminator().to_vec();
        out.extend(self.encode()?);
        Ok(out)
    }
}
