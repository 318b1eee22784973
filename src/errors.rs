/// Error types for the Kraken streaming session.
///
/// [`KrakenError`] covers local, synchronous client-side failures — invalid
/// requests the client rejects before anything is sent over the wire.
/// Transport and protocol conditions are not `Result` failures here: they
/// are observable state, modeled by [`crate::transport::TransportError`] and
/// [`crate::protocol::ParseOutcome`] respectively, surfaced through
/// connection transitions and callbacks.
use thiserror::Error;

use crate::data::Symbol;

#[derive(Error, Debug)]
pub enum KrakenError {
    #[error("symbol list must not be empty")]
    EmptySymbols,

    #[error("invalid book depth {0}, must be one of 10, 25, 100, 500, 1000")]
    InvalidDepth(u32),

    #[error("req_id must be non-zero")]
    ZeroReqId,

    #[error("{0} is already active")]
    AlreadyActive(Symbol),

    #[error("{0} already has a pending request")]
    AlreadyPending(Symbol),

    #[error("{0} is not active")]
    NotActive(Symbol),

    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),

    #[error("not connected")]
    NotConnected,

    #[error("connection attempt failed: {0}")]
    ConnectFailed(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

impl KrakenError {
    /// Returns true for errors that are rejected purely client-side, never
    /// sent to the server — used by tests asserting "no network send".
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            KrakenError::EmptySymbols
                | KrakenError::InvalidDepth(_)
                | KrakenError::ZeroReqId
                | KrakenError::AlreadyActive(_)
                | KrakenError::AlreadyPending(_)
                | KrakenError::NotActive(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_depth_message_includes_value() {
        let err = KrakenError::InvalidDepth(48);
        assert!(err.to_string().contains("48"));
    }

    #[test]
    fn local_rejection_classification() {
        assert!(KrakenError::EmptySymbols.is_local_rejection());
        assert!(!KrakenError::NotConnected.is_local_rejection());
    }
}
