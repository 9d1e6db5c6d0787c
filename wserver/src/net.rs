//! Socket plumbing for the control server.

pub mod listener;

pub use listener::{ControlListener, peer_pid, remove_stale};
