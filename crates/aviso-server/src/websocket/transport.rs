//! Adapts an axum `WebSocket` to [`FrameSource`] / [`FrameSink`].
//!
//! axum (via tungstenite) hands over whole messages, so every fragment
//! produced here is final. tungstenite also checks UTF-8 and the size limit
//! before a message reaches us; those failures are mapped back onto
//! [`ProtocolViolation`] so the session still closes with the right code.

use async_trait::async_trait;
use axum::extract::ws::{self, Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, error::CapacityError};

use super::frame::{CloseFrame, Fragment, FragmentKind, FrameSink, FrameSource};
use crate::errors::{ProtocolViolation, ReceiveError, TransportError};

/// Receive half of an upgraded socket.
pub struct WsFrameSource {
    rx: SplitStream<WebSocket>,
}

/// Send half of an upgraded socket.
pub struct WsFrameSink {
    tx: SplitSink<WebSocket, Message>,
}

/// Split an upgraded socket into its two halves.
pub fn split(ws: WebSocket) -> (WsFrameSource, WsFrameSink) {
    let (tx, rx) = ws.split();
    (WsFrameSource { rx }, WsFrameSink { tx })
}

/// Map one axum message onto the fragment model.
pub fn fragment_from_message(msg: Message) -> Fragment {
    match msg {
        Message::Text(text) => Fragment::text(Bytes::from(text), true),
        Message::Binary(data) => Fragment::binary(data),
        Message::Ping(data) => Fragment::control(FragmentKind::Ping, data),
        Message::Pong(data) => Fragment::control(FragmentKind::Pong, data),
        Message::Close(_) => Fragment::close(),
    }
}

/// Map a read failure onto the receive taxonomy.
pub fn receive_error(err: axum::Error) -> ReceiveError {
    match err.into_inner().downcast::<tungstenite::Error>() {
        Ok(inner) => match *inner {
            tungstenite::Error::Utf8(detail) => ProtocolViolation::InvalidUtf8(detail).into(),
            tungstenite::Error::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
                ProtocolViolation::MessageTooLarge {
                    size,
                    limit: max_size,
                }
                .into()
            }
            other => TransportError::Io(other.to_string()).into(),
        },
        Err(other) => TransportError::Io(other.to_string()).into(),
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ReceiveError>> {
        let msg = self.rx.next().await?;
        Some(msg.map(fragment_from_message).map_err(receive_error))
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.tx.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError> {
        self.tx
            .send(Message::Close(Some(ws::CloseFrame {
                code: frame.code,
                reason: frame.reason.into(),
            })))
            .await?;
        // The socket may already be shutting down after the close frame.
        let _ = self.tx.close().await;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        self.tx.close().await?;
        Ok(())
    }
}
