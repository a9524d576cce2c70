//! Identity types for DRIFT
//!
//! Node identifiers double as port offsets: a node with id `n` listens on
//! `base_port + n`.

use std::fmt;

/// Node identity - index of the simulated process
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ZERO: NodeId = NodeId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Port this node listens on, relative to `base_port`.
    /// Returns `None` when the sum does not fit a TCP port.
    pub fn port(self, base_port: u16) -> Option<u16> {
        let port = u64::from(base_port).checked_add(self.0)?;
        u16::try_from(port).ok()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}
