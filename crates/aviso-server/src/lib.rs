//! # aviso-server
//!
//! Axum `WebSocket` command server with periodic push notifications.
//!
//! - Frame reassembly: fragments → one UTF-8 logical message, size-bounded
//! - Command dispatch: `hola`, `adios`, `hola#<name>` and the default reply
//! - Connection sessions: receive/dispatch loop plus a serialized send gate
//! - Notification scheduler: fixed-period push to the current session
//! - HTTP endpoints: `/ws`, `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod server;
pub mod shutdown;
pub mod websocket;
