//! Process-scope notification push to the current session.

pub mod registry;
pub mod scheduler;
