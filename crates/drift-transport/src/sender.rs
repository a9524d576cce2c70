//! Fire-and-forget TCP sender

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use drift_core::{DriftError, DriftResult};
use drift_wire::Message;

use crate::Peer;

/// Default bound on connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound side of a node.
///
/// Implementations must not block the caller on the network and give no
/// delivery acknowledgement.
pub trait Outbound: Send + Sync {
    fn send(&self, peer: &Peer, message: Message);
}

/// Sender counters
#[derive(Debug, Default)]
pub struct SenderStats {
    attempted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl SenderStats {
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// TCP sender: one short-lived connection per message
#[derive(Clone)]
pub struct Sender {
    connect_timeout: Duration,
    stats: Arc<SenderStats>,
}

impl Sender {
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Sender {
            connect_timeout,
            stats: Arc::new(SenderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SenderStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbound for Sender {
    /// Spawns the delivery on the current runtime. Failures are logged and
    /// the message is dropped.
    fn send(&self, peer: &Peer, message: Message) {
        self.stats.attempted.fetch_add(1, Ordering::Relaxed);

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(peer = %peer.id, "failed to encode message: {}", e);
                return;
            }
        };

        let peer = *peer;
        let connect_timeout = self.connect_timeout;
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            match deliver(peer.addr, &payload, connect_timeout).await {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        from = ?message.sender,
                        to = %peer.id,
                        "failed to send message: {}",
                        e
                    );
                }
            }
        });
    }
}

/// Connect, write the payload, half-close, close
pub async fn deliver(addr: SocketAddr, payload: &[u8], connect_timeout: Duration) -> DriftResult<()> {
    let mut stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| DriftError::ConnectFailed(addr))?
        .map_err(|_| DriftError::ConnectFailed(addr))?;

    stream
        .write_all(payload)
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))?;
    // Half-close so the reader's read-to-end completes
    stream
        .shutdown()
        .await
        .map_err(|e| DriftError::Transport(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InboundQueue, Listener};
    use drift_core::NodeId;

    #[tokio::test]
    async fn test_sender_delivers_to_listener() {
        let queue = InboundQueue::new();
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), queue.clone())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .spawn();

        let sender = Sender::new();
        let peer = Peer::new(NodeId::new(1), handle.local_addr());
        sender.send(&peer, Message::new(NodeId::new(0), 1));

        for _ in 0..200 {
            if !queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(queue.pop(), Some((Message::new(NodeId::new(0), 1), 0)));
        assert_eq!(sender.stats().attempted(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_to_closed_port_fails() {
        // Grab a free port, then release it
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let result = deliver(addr, b"{}", Duration::from_millis(500)).await;
        assert!(matches!(result, Err(DriftError::ConnectFailed(a)) if a == addr));
    }

    #[tokio::test]
    async fn test_send_failure_is_counted_not_raised() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let sender = Sender::with_connect_timeout(Duration::from_millis(500));
        sender.send(&Peer::new(NodeId::new(9), addr), Message::new(NodeId::new(0), 3));

        let stats = sender.stats();
        for _ in 0..200 {
            if stats.failed() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
    }
}
