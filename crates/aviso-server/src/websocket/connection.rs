//! Per-connection state shared between the session loop and the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::frame::{CloseFrame, FrameSink};
use crate::errors::TransportError;

/// Lifecycle state visible to collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting sends.
    Open,
    /// Closed by either side, or cancelled.
    Closed,
}

/// The live association between one connection and its processing loop.
///
/// All writes go through one async mutex around the send half, so at most one
/// send (or close) is in flight at a time. Reads never touch this gate.
pub struct ConnectionSession {
    /// Unique session ID.
    pub id: String,
    /// Send gate.
    sink: Mutex<Box<dyn FrameSink>>,
    /// Set exactly once, by whichever path closes first.
    closed: AtomicBool,
    /// Cancelled on close and on process shutdown.
    cancel: CancellationToken,
    /// When the connection was accepted.
    pub connected_at: Instant,
    /// Text messages successfully written.
    messages_sent: AtomicU64,
}

impl ConnectionSession {
    /// Wrap the send half of an accepted connection.
    pub fn new(id: String, sink: Box<dyn FrameSink>, cancel: CancellationToken) -> Self {
        Self {
            id,
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            cancel,
            connected_at: Instant::now(),
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    /// Shorthand for `state() == Open`.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Token cancelled when this session stops.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Number of text messages written so far.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Send one text message through the gate.
    ///
    /// Fails with [`TransportError::NotOpen`] without touching the socket if
    /// the session is closed or cancelled, before or after waiting for the gate.
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        let mut sink = self.sink.lock().await;
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        sink.send_text(text).await?;
        let _ = self.messages_sent.fetch_add(1, Ordering::Relaxed);
        trace!(session_id = %self.id, bytes = text.len(), "text sent");
        Ok(())
    }

    /// [`send_text`](Self::send_text) bounded by `timeout`, including the wait for the gate.
    pub async fn send_text_within(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        tokio::time::timeout(timeout, self.send_text(text))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    /// Close locally. Sends `frame` only on the first call.
    ///
    /// Returns `Ok(true)` if this call performed the close.
    pub async fn close(&self, frame: CloseFrame) -> Result<bool, TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.cancel.cancel();
        let mut sink = self.sink.lock().await;
        sink.close(frame).await?;
        Ok(true)
    }

    /// Complete a close the peer started.
    ///
    /// Flushes the transport's pending close reply without sending a frame of
    /// our own. Returns `Ok(true)` if this call performed the close.
    pub async fn acknowledge_close(&self) -> Result<bool, TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.cancel.cancel();
        let mut sink = self.sink.lock().await;
        sink.finish().await?;
        Ok(true)
    }

    /// Record a close that needs no close frame (peer closed or socket died).
    ///
    /// Returns `true` if this call performed the transition.
    pub fn mark_closed(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.cancel.cancel();
        first
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::websocket::testing::{RecordingSink, Wire, WireEvent};

    fn make_session() -> (Arc<ConnectionSession>, Wire) {
        let (sink, wire) = RecordingSink::new();
        let session = ConnectionSession::new("sess_1".into(), Box::new(sink), CancellationToken::new());
        (Arc::new(session), wire)
    }

    #[test]
    fn new_session_is_open() {
        let (session, _wire) = make_session();
        assert_eq!(session.id, "sess_1");
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.messages_sent(), 0);
    }

    #[tokio::test]
    async fn send_text_reaches_sink() {
        let (session, wire) = make_session();
        session.send_text("hola").await.unwrap();
        assert_eq!(wire.texts(), vec!["hola".to_string()]);
        assert_eq!(session.messages_sent(), 1);
    }

    #[tokio::test]
    async fn close_is_performed_once() {
        let (session, wire) = make_session();
        let frame = CloseFrame::new(1000, "Desconectado");
        assert!(session.close(frame.clone()).await.unwrap());
        assert!(!session.close(frame.clone()).await.unwrap());
        assert!(!session.mark_closed());
        assert_eq!(wire.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(wire.closes(), vec![frame]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn mark_closed_suppresses_close_frame() {
        let (session, wire) = make_session();
        assert!(session.mark_closed());
        assert!(!session.close(CloseFrame::new(1000, "x")).await.unwrap());
        assert_eq!(wire.close_calls.load(Ordering::SeqCst), 0);
        assert!(session.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn acknowledge_flushes_without_close_frame() {
        let (session, wire) = make_session();
        assert!(session.acknowledge_close().await.unwrap());
        assert!(!session.acknowledge_close().await.unwrap());
        assert!(!session.close(CloseFrame::new(1000, "x")).await.unwrap());
        assert_eq!(wire.finish_calls.load(Ordering::SeqCst), 1);
        assert_eq!(wire.close_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn acknowledge_after_local_close_is_noop() {
        let (session, wire) = make_session();
        assert!(session.close(CloseFrame::new(1000, "Desconectado")).await.unwrap());
        assert!(!session.acknowledge_close().await.unwrap());
        assert_eq!(wire.finish_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_after_close_is_not_open() {
        let (session, wire) = make_session();
        let _ = session.mark_closed();
        assert_matches!(session.send_text("late").await, Err(TransportError::NotOpen));
        assert!(wire.texts().is_empty());
    }

    #[tokio::test]
    async fn send_after_cancel_is_not_open() {
        let (session, _wire) = make_session();
        session.cancel_token().cancel();
        assert_eq!(session.state(), SessionState::Closed);
        assert_matches!(session.send_text("late").await, Err(TransportError::NotOpen));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let (sink, _wire) = RecordingSink::new();
        let session = ConnectionSession::new("s".into(), Box::new(sink.failing()), CancellationToken::new());
        assert_matches!(session.send_text("x").await, Err(TransportError::Io(_)));
        assert_eq!(session.messages_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_within_times_out_on_stuck_sink() {
        let (sink, _wire) = RecordingSink::new();
        let session = ConnectionSession::new("s".into(), Box::new(sink.hanging()), CancellationToken::new());
        let timeout = Duration::from_millis(50);
        assert_matches!(
            session.send_text_within("x", timeout).await,
            Err(TransportError::Timeout(t)) if t == timeout
        );
    }

    #[tokio::test]
    async fn concurrent_sends_never_interleave() {
        let (sink, wire) = RecordingSink::new();
        let session = Arc::new(ConnectionSession::new(
            "s".into(),
            Box::new(sink.with_char_delay(Duration::from_millis(1))),
            CancellationToken::new(),
        ));

        let reply = {
            let session = session.clone();
            tokio::spawn(async move { session.send_text("Hola como estás, bienvenido").await })
        };
        let notification = {
            let session = session.clone();
            tokio::spawn(async move { session.send_text("notification message").await })
        };
        reply.await.unwrap().unwrap();
        notification.await.unwrap().unwrap();

        assert_eq!(wire.max_in_flight.load(Ordering::SeqCst), 1);

        // Each sender's characters form one contiguous run.
        let chars = wire.chars.lock().clone();
        let mut runs: Vec<usize> = Vec::new();
        for (seq, _) in &chars {
            if runs.last() != Some(seq) {
                runs.push(*seq);
            }
        }
        assert_eq!(runs.len(), 2, "interleaved writes: {runs:?}");

        let texts = wire.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts.contains(&"Hola como estás, bienvenido".to_string()));
        assert!(texts.contains(&"notification message".to_string()));
        assert!(
            wire.events()
                .iter()
                .all(|e| matches!(e, WireEvent::Text(_)))
        );
    }
}
