//! Tracks the single "current" session without owning it.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::websocket::connection::ConnectionSession;

/// Holds a weak reference to the most recently opened session.
///
/// Updated only at session entry and exit. Readers upgrade the reference and
/// go through the session's own send gate.
#[derive(Default)]
pub struct SessionRegistry {
    current: RwLock<Option<Weak<ConnectionSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the current session, replacing any previous one.
    pub fn register(&self, session: &Arc<ConnectionSession>) {
        let previous = self.current.write().replace(Arc::downgrade(session));
        if let Some(prev) = previous.and_then(|w| w.upgrade()) {
            debug!(previous = %prev.id, current = %session.id, "current session replaced");
        }
    }

    /// Clear the entry if it still points at `session`.
    ///
    /// Returns `true` if the entry was cleared.
    pub fn deregister(&self, session: &Arc<ConnectionSession>) -> bool {
        let mut current = self.current.write();
        let is_same = current
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(session)));
        if is_same {
            *current = None;
        }
        is_same
    }

    /// The current session, if one is registered and still alive.
    pub fn current(&self) -> Option<Arc<ConnectionSession>> {
        self.current.read().as_ref().and_then(Weak::upgrade)
    }

    /// Whether a live, open session is registered.
    pub fn has_open_session(&self) -> bool {
        self.current().is_some_and(|s| s.is_open())
    }
}
