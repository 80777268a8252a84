//! Error taxonomy for sessions and the server.
//!
//! Unrecognized commands are not errors; they produce the default reply.

use std::time::Duration;

use thiserror::Error;

use crate::websocket::frame::FragmentKind;

/// The peer broke the text-only framing contract. Fatal to the session.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    /// A fragment arrived with a non-text message type.
    #[error("unexpected {kind:?} fragment, only text messages are accepted")]
    NonText {
        /// The offending fragment kind.
        kind: FragmentKind,
    },
    /// The payload is not valid UTF-8.
    #[error("message is not valid UTF-8: {0}")]
    InvalidUtf8(String),
    /// The reassembled payload grew past the configured bound.
    #[error("message of at least {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge {
        /// Bytes buffered when the bound was hit.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl ProtocolViolation {
    /// Close status code matching the violation.
    pub fn close_code(&self) -> u16 {
        use axum::extract::ws::close_code;
        match self {
            Self::NonText { .. } => close_code::UNSUPPORTED,
            Self::InvalidUtf8(_) => close_code::INVALID,
            Self::MessageTooLarge { .. } => close_code::SIZE,
        }
    }

    /// Reason text sent with the close frame.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::NonText { .. } | Self::InvalidUtf8(_) => "Mensaje inesperado",
            Self::MessageTooLarge { .. } => "Mensaje demasiado grande",
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NonText { .. } => "non_text",
            Self::InvalidUtf8(_) => "invalid_utf8",
            Self::MessageTooLarge { .. } => "too_large",
        }
    }
}

/// Send or receive failed at the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The session is closed or cancelled; nothing was sent.
    #[error("connection is not open")]
    NotOpen,
    /// A single send attempt did not finish in time.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// The underlying socket failed.
    #[error("transport failure: {0}")]
    Io(String),
}

impl From<axum::Error> for TransportError {
    fn from(err: axum::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Why a logical message could not be received.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The peer violated the text-only contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    /// The socket failed mid-read.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised while starting the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_match_violation() {
        let non_text = ProtocolViolation::NonText {
            kind: FragmentKind::Binary,
        };
        assert_eq!(non_text.close_code(), 1003);

        let utf8 = ProtocolViolation::InvalidUtf8("invalid byte at 0".into());
        assert_eq!(utf8.close_code(), 1007);

        let big = ProtocolViolation::MessageTooLarge { size: 11, limit: 10 };
        assert_eq!(big.close_code(), 1009);
    }

    #[test]
    fn violation_display() {
        let err = ProtocolViolation::MessageTooLarge { size: 11, limit: 10 };
        assert_eq!(
            err.to_string(),
            "message of at least 11 bytes exceeds the 10 byte limit"
        );
        let err = ProtocolViolation::NonText {
            kind: FragmentKind::Binary,
        };
        assert!(err.to_string().contains("Binary"));
    }

    #[test]
    fn transport_display() {
        assert_eq!(TransportError::NotOpen.to_string(), "connection is not open");
        assert!(
            TransportError::Timeout(Duration::from_millis(5))
                .to_string()
                .contains("5ms")
        );
    }
}
