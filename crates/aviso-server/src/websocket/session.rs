//! WebSocket session lifecycle. Handles a single accepted connection from
//! entry through close.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::close_code;
use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ConnectionSession;
use super::dispatcher::{self, CLOSE_REASON, Outbound};
use super::frame::{CloseFrame, FrameSink, FrameSource};
use super::reassembler::{FrameReassembler, Received};
use crate::errors::{ReceiveError, TransportError};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_MESSAGES_RECEIVED_TOTAL, WS_PROTOCOL_VIOLATIONS_TOTAL,
};
use crate::notifications::registry::SessionRegistry;

/// Everything a session needs besides the connection itself.
#[derive(Clone)]
pub struct SessionContext {
    /// Where the session registers itself while open.
    pub registry: Arc<SessionRegistry>,
    /// Process shutdown token; each session runs on a child token.
    pub shutdown: CancellationToken,
    /// Bound on one reassembled message.
    pub max_message_bytes: usize,
    /// Bound on one send or close.
    pub send_timeout: Duration,
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The peer closed, or the stream ended.
    PeerClosed,
    /// A farewell command closed the connection.
    LocalClosed,
    /// The peer broke the text-only contract; the connection was closed.
    ProtocolViolation,
    /// Reading or writing failed at the transport layer.
    TransportFailed,
    /// Process shutdown cancelled the session.
    Cancelled,
}

impl SessionOutcome {
    /// Short label for metrics and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::LocalClosed => "local_closed",
            Self::ProtocolViolation => "protocol_violation",
            Self::TransportFailed => "transport_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Run a session for an accepted connection.
///
/// 1. Registers the session as current
/// 2. Reassembles and dispatches messages until a close condition
/// 3. Closes the connection exactly once and deregisters
///
/// Replies go through the session's send gate, shared with the notification
/// scheduler.
pub async fn run_session<S>(
    source: S,
    sink: Box<dyn FrameSink>,
    ctx: &SessionContext,
) -> SessionOutcome
where
    S: FrameSource,
{
    let session_id = uuid::Uuid::now_v7().to_string();
    let session = Arc::new(ConnectionSession::new(
        session_id,
        sink,
        ctx.shutdown.child_token(),
    ));
    run_with(source, &session, ctx).await
}

#[instrument(skip_all, fields(session_id = %session.id))]
async fn run_with<S>(
    mut source: S,
    session: &Arc<ConnectionSession>,
    ctx: &SessionContext,
) -> SessionOutcome
where
    S: FrameSource,
{
    info!("session opened");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    ctx.registry.register(session);

    let reassembler = FrameReassembler::new(ctx.max_message_bytes);
    let outcome = receive_loop(&mut source, session, &reassembler, ctx.send_timeout).await;

    // Whatever path got here, the handle ends up closed exactly once.
    let _ = session.mark_closed();
    let _ = ctx.registry.deregister(session);

    info!(
        outcome = outcome.label(),
        messages_sent = session.messages_sent(),
        "session closed"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "outcome" => outcome.label()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(session.age().as_secs_f64());
    outcome
}

async fn receive_loop<S>(
    source: &mut S,
    session: &ConnectionSession,
    reassembler: &FrameReassembler,
    send_timeout: Duration,
) -> SessionOutcome
where
    S: FrameSource,
{
    let cancel = session.cancel_token().clone();

    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return shut_down(session, send_timeout).await;
            }
            received = reassembler.receive(source) => received,
        };

        let message = match received {
            Ok(Received::Message(message)) => message,
            Ok(Received::EndOfConnection) => {
                info!("peer closed connection");
                acknowledge_bounded(session, send_timeout).await;
                return SessionOutcome::PeerClosed;
            }
            Err(ReceiveError::Protocol(violation)) => {
                warn!(error = %violation, "protocol violation, closing");
                counter!(WS_PROTOCOL_VIOLATIONS_TOTAL, "kind" => violation.label()).increment(1);
                let frame = CloseFrame::new(violation.close_code(), violation.close_reason());
                close_bounded(session, frame, send_timeout).await;
                return SessionOutcome::ProtocolViolation;
            }
            Err(ReceiveError::Transport(e)) => {
                warn!(error = %e, "receive failed");
                let _ = session.mark_closed();
                return SessionOutcome::TransportFailed;
            }
        };

        counter!(WS_MESSAGES_RECEIVED_TOTAL).increment(1);
        debug!(bytes = message.as_str().len(), "message received");

        for action in dispatcher::dispatch(message.as_str()) {
            match action {
                Outbound::Text(reply) => {
                    match session.send_text_within(&reply, send_timeout).await {
                        Ok(()) => {}
                        Err(TransportError::NotOpen) if cancel.is_cancelled() => {
                            return shut_down(session, send_timeout).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "reply failed");
                            let _ = session.mark_closed();
                            return SessionOutcome::TransportFailed;
                        }
                    }
                }
                Outbound::Close(frame) => {
                    info!(code = frame.code, reason = %frame.reason, "closing on request");
                    close_bounded(session, frame, send_timeout).await;
                    return SessionOutcome::LocalClosed;
                }
            }
        }
    }
}

/// Close after cancellation. A close already performed by another path wins.
async fn shut_down(session: &ConnectionSession, send_timeout: Duration) -> SessionOutcome {
    debug!("session cancelled");
    close_bounded(session, CloseFrame::new(close_code::AWAY, CLOSE_REASON), send_timeout).await;
    SessionOutcome::Cancelled
}

async fn close_bounded(session: &ConnectionSession, frame: CloseFrame, timeout: Duration) {
    match tokio::time::timeout(timeout, session.close(frame)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => debug!(error = %e, "close frame not delivered"),
        Err(_) => debug!(?timeout, "close timed out"),
    }
}

async fn acknowledge_bounded(session: &ConnectionSession, timeout: Duration) {
    match tokio::time::timeout(timeout, session.acknowledge_close()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => debug!(error = %e, "close reply not flushed"),
        Err(_) => debug!(?timeout, "close reply timed out"),
    }
}
