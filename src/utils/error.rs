//! Error types for trade monitor operations.
//!
//! This module defines a single error enumeration using `thiserror` so every
//! layer (codec, fetcher, engine, store, query) can propagate with `?`.

use thiserror::Error;

/// Custom error type for trade monitor operations.
///
/// Covers configuration issues, RPC communication, event decoding and
/// cache persistence. Per-signature and per-log-line failures are absorbed
/// by the pipeline; only cycle-level failures reach the caller.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Errors while decoding an event payload.
    ///
    /// Raised for truncated buffers, invalid UTF-8 strings and trade type
    /// tags outside the known set.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Errors interacting with the Solana RPC that are not client errors.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Errors from the Solana RPC client.
    #[error("RPC client error: {0}")]
    RpcClientError(Box<solana_client::client_error::ClientError>),

    /// Errors related to configuration.
    ///
    /// This includes invalid environment values and out-of-range settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors during Solana public key parsing.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] solana_sdk::pubkey::ParsePubkeyError),

    /// Errors during transaction signature parsing.
    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] solana_sdk::signature::ParseSignatureError),

    /// Filesystem failures while reading or writing the event cache.
    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON encoding or decoding of the event cache failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error when a registry exceeds its configured capacity.
    #[error("Registry capacity exceeded: {0}")]
    RegistryCapacityExceeded(String),

    /// A pagination cursor does not name any cached record.
    #[error("Cursor not found: {0}")]
    CursorNotFound(String),

    /// A query was issued with arguments it cannot satisfy.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Type alias for Results using `MonitorError`.
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<solana_client::client_error::ClientError> for MonitorError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        MonitorError::RpcClientError(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MonitorError::DecodingError("truncated".into());
        assert_eq!(err.to_string(), "Decoding error: truncated");

        let err = MonitorError::CursorNotFound("abc".into());
        assert_eq!(err.to_string(), "Cursor not found: abc");
    }

    #[test]
    fn test_io_error_conversion() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(MonitorError::StorageError(_))));
    }
}
