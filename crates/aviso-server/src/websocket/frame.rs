//! Fragment model and the two halves of a connection handle.
//!
//! The receive half ([`FrameSource`]) is owned by the session loop. The send
//! half ([`FrameSink`]) lives behind the session's send gate so the read loop
//! and the notification scheduler never write concurrently.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::{ReceiveError, TransportError};

/// Message-type marker carried by every fragment.
///
/// Continuation fragments repeat the kind of the message they continue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    /// UTF-8 text data.
    Text,
    /// Binary data.
    Binary,
    /// Peer-initiated close.
    Close,
    /// Control ping.
    Ping,
    /// Control pong.
    Pong,
}

/// One wire-level chunk of a logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Message-type marker.
    pub kind: FragmentKind,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// `true` when this fragment ends its message.
    pub is_final: bool,
}

impl Fragment {
    /// A text fragment.
    pub fn text(payload: impl Into<Bytes>, is_final: bool) -> Self {
        Self {
            kind: FragmentKind::Text,
            payload: payload.into(),
            is_final,
        }
    }

    /// A complete binary message.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FragmentKind::Binary,
            payload: payload.into(),
            is_final: true,
        }
    }

    /// A close notification from the peer.
    pub fn close() -> Self {
        Self {
            kind: FragmentKind::Close,
            payload: Bytes::new(),
            is_final: true,
        }
    }

    /// A control frame (`Ping` or `Pong`).
    pub fn control(kind: FragmentKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            is_final: true,
        }
    }
}

/// Status code and reason sent when closing locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    /// RFC 6455 status code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseFrame {
    /// Build a close frame.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Receive half of a connection handle.
#[async_trait]
pub trait FrameSource: Send {
    /// Next fragment, or `None` once the stream has ended.
    ///
    /// Transports that validate frames themselves report framing failures as
    /// [`ReceiveError::Protocol`].
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ReceiveError>>;
}

/// Send half of a connection handle. Callers must serialize access.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one complete text message.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Send a close frame and release the write side.
    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError>;

    /// Flush pending writes (such as the reply to a peer's close) and release
    /// the write side without sending a close frame of our own.
    async fn finish(&mut self) -> Result<(), TransportError>;
}
