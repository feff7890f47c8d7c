//! Persisted trade records and the transaction context they are tagged with.

use crate::types::events::TradeType;
use serde::{Deserialize, Serialize};

/// Transaction metadata handed to the log scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub signature: String,
    pub slot: u64,
    /// On-chain block time in seconds, when the node reports one.
    pub block_time: Option<i64>,
}

/// A decoded trade event as stored in the cache file.
///
/// `signature` is the identity of a record; `id` is only the submitting
/// application's identifier and may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub signature: String,
    /// Block time in seconds, 0 when unknown.
    #[serde(default)]
    pub block_time: i64,
    #[serde(default)]
    pub slot: u64,
    pub id: String,
    pub user_id: String,
    pub fund_id: String,
    pub trade_type: TradeType,
    #[serde(with = "bigint")]
    pub amount: u64,
    #[serde(with = "bigint")]
    pub price: u64,
    /// Seconds since the epoch, resolved by the scanner's timestamp policy.
    #[serde(with = "bigint")]
    pub timestamp: i64,
    /// Local decode time in milliseconds.
    #[serde(default)]
    pub parsed_at: i64,
}

impl TradeRecord {
    /// Whether `address` is this trade's user or fund.
    #[must_use]
    pub fn involves(&self, address: &str) -> bool {
        self.user_id == address || self.fund_id == address
    }
}

/// 64-bit integers are written as `"<digits>n"` so readers that parse numbers
/// as doubles never see them as numbers. Plain JSON numbers and unsuffixed
/// digit strings are accepted when reading.
pub(crate) mod bigint {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Unsigned(u64),
        Signed(i64),
        Text(String),
    }

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(&format_args!("{value}n"))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr + TryFrom<u64> + TryFrom<i64>,
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Unsigned(n) => {
                <T as TryFrom<u64>>::try_from(n)
                    .map_err(|_| D::Error::custom(format!("{n} out of range")))
            }
            Raw::Signed(n) => {
                <T as TryFrom<i64>>::try_from(n)
                    .map_err(|_| D::Error::custom(format!("{n} out of range")))
            }
            Raw::Text(s) => {
                let digits = s.strip_suffix('n').unwrap_or(&s);
                let unsigned = digits.strip_prefix('-').unwrap_or(digits);
                if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(D::Error::custom(format!("invalid integer string '{s}'")));
                }
                digits
                    .parse::<T>()
                    .map_err(|_| D::Error::custom(format!("integer '{s}' out of range")))
            }
        }
    }
}
