//! Reassembles fragments into one logical UTF-8 message.

use bytes::BytesMut;
use tracing::{debug, trace};

use super::frame::{FragmentKind, FrameSource};
use crate::errors::{ProtocolViolation, ReceiveError};

/// A fully reassembled, UTF-8 validated text message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalMessage(String);

impl LogicalMessage {
    /// Message text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of one receive call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Received {
    /// A complete text message.
    Message(LogicalMessage),
    /// The peer closed, or the stream ended. No message is produced.
    EndOfConnection,
}

/// Accumulates fragments until one marked final arrives.
#[derive(Clone, Copy, Debug)]
pub struct FrameReassembler {
    max_message_bytes: usize,
}

impl FrameReassembler {
    /// Create a reassembler that rejects messages larger than `max_message_bytes`.
    pub fn new(max_message_bytes: usize) -> Self {
        Self { max_message_bytes }
    }

    /// Read fragments from `source` until a full logical message is available.
    ///
    /// Ping/Pong fragments are skipped. A close fragment (or the end of the
    /// stream) yields [`Received::EndOfConnection`], discarding any partial
    /// message. Non-text data, malformed UTF-8, and oversize messages are
    /// [`ProtocolViolation`]s.
    pub async fn receive<S>(&self, source: &mut S) -> Result<Received, ReceiveError>
    where
        S: FrameSource + ?Sized,
    {
        let mut buffer = BytesMut::new();
        let mut fragments = 0usize;

        loop {
            let Some(next) = source.next_fragment().await else {
                debug!(buffered = buffer.len(), "stream ended");
                return Ok(Received::EndOfConnection);
            };
            let fragment = next?;

            match fragment.kind {
                FragmentKind::Ping | FragmentKind::Pong => continue,
                FragmentKind::Close => {
                    if !buffer.is_empty() {
                        debug!(buffered = buffer.len(), "close received mid-message, discarding");
                    }
                    return Ok(Received::EndOfConnection);
                }
                FragmentKind::Binary => {
                    return Err(ProtocolViolation::NonText {
                        kind: fragment.kind,
                    }
                    .into());
                }
                FragmentKind::Text => {}
            }

            let size = buffer.len() + fragment.payload.len();
            if size > self.max_message_bytes {
                return Err(ProtocolViolation::MessageTooLarge {
                    size,
                    limit: self.max_message_bytes,
                }
                .into());
            }
            buffer.extend_from_slice(&fragment.payload);
            fragments += 1;

            if fragment.is_final {
                break;
            }
        }

        trace!(fragments, bytes = buffer.len(), "message reassembled");
        let text = String::from_utf8(Vec::from(buffer))
            .map_err(|e| ProtocolViolation::InvalidUtf8(e.utf8_error().to_string()))?;
        Ok(Received::Message(LogicalMessage(text)))
    }
}
