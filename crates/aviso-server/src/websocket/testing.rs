//! In-memory connection halves for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::frame::{CloseFrame, Fragment, FrameSink, FrameSource};
use crate::errors::{ReceiveError, TransportError};

/// Source fed from an unbounded channel. Blocks while the sender is alive
/// and empty; ends once the sender is dropped.
pub(crate) struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Fragment, ReceiveError>>,
}

pub(crate) type SourceTx = mpsc::UnboundedSender<Result<Fragment, ReceiveError>>;

impl ChannelSource {
    pub(crate) fn open() -> (Self, SourceTx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }

    /// Yields `fragments` in order, then ends.
    pub(crate) fn scripted(fragments: Vec<Fragment>) -> Self {
        let (source, tx) = Self::open();
        for fragment in fragments {
            let _ = tx.send(Ok(fragment));
        }
        source
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ReceiveError>> {
        self.rx.recv().await
    }
}

/// What the peer observed on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum WireEvent {
    Text(String),
    Close(CloseFrame),
}

/// Shared view of everything a [`RecordingSink`] wrote.
#[derive(Clone, Default)]
pub(crate) struct Wire {
    /// Bytes in write order, one `char` per write call, tagged with the sender's sequence.
    pub(crate) chars: Arc<Mutex<Vec<(usize, char)>>>,
    pub(crate) events: Arc<Mutex<Vec<WireEvent>>>,
    pub(crate) in_flight: Arc<AtomicUsize>,
    pub(crate) max_in_flight: Arc<AtomicUsize>,
    pub(crate) close_calls: Arc<AtomicUsize>,
    pub(crate) finish_calls: Arc<AtomicUsize>,
    next_seq: Arc<AtomicUsize>,
}

impl Wire {
    pub(crate) fn events(&self) -> Vec<WireEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WireEvent::Text(t) => Some(t),
                WireEvent::Close(_) => None,
            })
            .collect()
    }

    pub(crate) fn closes(&self) -> Vec<CloseFrame> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WireEvent::Close(c) => Some(c),
                WireEvent::Text(_) => None,
            })
            .collect()
    }
}

/// Sink that writes one character at a time, yielding in between, so any
/// unserialized concurrent writer would visibly interleave.
pub(crate) struct RecordingSink {
    wire: Wire,
    char_delay: Option<Duration>,
    fail_sends: bool,
    hang_sends: bool,
}

impl RecordingSink {
    pub(crate) fn new() -> (Self, Wire) {
        let wire = Wire::default();
        (
            Self {
                wire: wire.clone(),
                char_delay: None,
                fail_sends: false,
                hang_sends: false,
            },
            wire,
        )
    }

    pub(crate) fn with_char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = Some(delay);
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub(crate) fn hanging(mut self) -> Self {
        self.hang_sends = true;
        self
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.hang_sends {
            futures::future::pending::<()>().await;
        }
        if self.fail_sends {
            return Err(TransportError::Io("broken pipe".into()));
        }

        let now = self.wire.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.wire.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let seq = self.wire.next_seq.fetch_add(1, Ordering::SeqCst);

        for c in text.chars() {
            self.wire.chars.lock().push((seq, c));
            match self.char_delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
        }

        self.wire.events.lock().push(WireEvent::Text(text.to_string()));
        let _ = self.wire.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError> {
        let _ = self.wire.close_calls.fetch_add(1, Ordering::SeqCst);
        self.wire.events.lock().push(WireEvent::Close(frame));
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        let _ = self.wire.finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
