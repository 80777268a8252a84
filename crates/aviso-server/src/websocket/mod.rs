//! WebSocket framing, command dispatch, and per-connection sessions.

pub mod connection;
pub mod dispatcher;
pub mod frame;
pub mod reassembler;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
