//! Inbound message queue
//!
//! Many producers (connection handlers), one consumer (the event loop).
//! Order is arrival order, which says nothing about causality.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use drift_wire::Message;

/// Thread-safe unbounded FIFO of received messages
#[derive(Clone, Default)]
pub struct InboundQueue {
    inner: Arc<Mutex<VecDeque<Message>>>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail
    pub fn push(&self, message: Message) {
        self.inner.lock().push_back(message);
    }

    /// Take the head without blocking.
    /// Returns the message and the number of messages still queued
    pub fn pop(&self) -> Option<(Message, usize)> {
        let mut queue = self.inner.lock();
        let message = queue.pop_front()?;
        Some((message, queue.len()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for InboundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundQueue")
            .field("len", &self.len())
            .finish()
    }
}
