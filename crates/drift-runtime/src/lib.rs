//! DRIFT Runtime - one simulated process
//!
//! Each tick of a node's event loop does exactly one of:
//! 1. Receive: pop one inbound message, merge its clock
//! 2. Send: to the first peer, the second peer, or every peer
//! 3. Internal: advance the clock only
//!
//! Receiving has priority over local actions. Every action appends one line
//! to the node's event log.

pub mod action;
pub mod event_log;
pub mod event_loop;
pub mod node;
pub mod ticks;

pub use action::*;
pub use event_log::*;
pub use event_loop::*;
pub use node::*;
pub use ticks::*;
