//! DRIFT Transport Layer - TCP, one message per connection
//!
//! This crate provides:
//! - Inbound queue shared by connection handlers and the event loop
//! - Listener with a bounded accept poll and per-connection handlers
//! - Fire-and-forget sender

pub mod listener;
pub mod queue;
pub mod sender;

pub use listener::*;
pub use queue::*;
pub use sender::*;

use std::fmt;
use std::net::SocketAddr;

use drift_core::NodeId;

/// Entry of a node's peer table
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl Peer {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Peer { id, addr }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({} @ {})", self.id, self.addr)
    }
}
