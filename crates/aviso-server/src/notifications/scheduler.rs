//! Fixed-period notification push.
//!
//! Runs at process scope, independent of any single session. Each tick looks
//! up the current session and, if it is open, sends the notification through
//! that session's send gate. A send is bounded by the configured timeout so a
//! stuck connection cannot stall later ticks. Failures are logged and the
//! notification is dropped; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::SessionRegistry;
use crate::metrics::{NOTIFICATIONS_FAILED_TOTAL, NOTIFICATIONS_SENT_TOTAL};

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session is registered.
    NoSession,
    /// A session is registered but no longer open.
    NotOpen,
    /// The notification was written.
    Sent,
    /// The send failed or timed out; the notification was dropped.
    Failed,
}

/// Pushes a fixed message to the current session every `period`.
pub struct NotificationScheduler {
    registry: Arc<SessionRegistry>,
    period: Duration,
    message: Arc<str>,
    send_timeout: Duration,
}

impl NotificationScheduler {
    /// Create a scheduler.
    pub fn new(
        registry: Arc<SessionRegistry>,
        period: Duration,
        message: impl Into<Arc<str>>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            period,
            message: message.into(),
            send_timeout,
        }
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one tick.
    pub async fn tick(&self) -> TickOutcome {
        let Some(session) = self.registry.current() else {
            debug!("no session registered, skipping notification");
            return TickOutcome::NoSession;
        };
        if !session.is_open() {
            debug!(session_id = %session.id, "session not open, skipping notification");
            return TickOutcome::NotOpen;
        }

        match session
            .send_text_within(&self.message, self.send_timeout)
            .await
        {
            Ok(()) => {
                counter!(NOTIFICATIONS_SENT_TOTAL).increment(1);
                debug!(session_id = %session.id, "notification sent");
                TickOutcome::Sent
            }
            Err(e) => {
                counter!(NOTIFICATIONS_FAILED_TOTAL).increment(1);
                warn!(session_id = %session.id, error = %e, "error sending notification");
                TickOutcome::Failed
            }
        }
    }

    /// Tick until `cancel` fires. The first tick is immediate.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = self.period().as_secs_f64(), "notification scheduler started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                }
            }
        }

        info!("notification scheduler stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
