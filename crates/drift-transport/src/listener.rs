//! TCP listener implementation

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use drift_core::{DriftError, DriftResult};
use drift_wire::Message;

use crate::InboundQueue;

/// Upper bound on how long the accept loop waits before re-checking its stop signal
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Largest payload accepted on one connection
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Cooperative stop flag shared between a node and its listener
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Listener counters
#[derive(Debug, Default)]
pub struct ListenerStats {
    accepted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    accept_errors: AtomicU64,
}

impl ListenerStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn accept_errors(&self) -> u64 {
        self.accept_errors.load(Ordering::Relaxed)
    }
}

/// Source of inbound connections
trait Accept: Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// TCP listener feeding the inbound queue
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    queue: InboundQueue,
    poll_interval: Duration,
    stats: Arc<ListenerStats>,
}

impl Listener {
    /// Bind to the node's address. Failure here is fatal for the node.
    pub async fn bind(addr: SocketAddr, queue: InboundQueue) -> DriftResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| bind_error(addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| bind_error(addr, e))?;

        Ok(Listener {
            listener,
            local_addr,
            queue,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: Arc::new(ListenerStats::default()),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Start the accept loop on the current runtime
    pub fn spawn(self) -> ListenerHandle {
        let stop = StopSignal::new();
        let local_addr = self.local_addr;
        let stats = self.stats();
        let task = tokio::spawn(self.run(stop.clone()));

        ListenerHandle {
            stop,
            task,
            local_addr,
            stats,
        }
    }

    /// Accept connections until `stop` is raised.
    /// The stop signal is checked at least once per poll interval.
    pub async fn run(self, stop: StopSignal) {
        tracing::debug!(addr = %self.local_addr, "listener started");
        accept_loop(
            &self.listener,
            self.local_addr,
            &self.queue,
            self.poll_interval,
            &self.stats,
            &stop,
        )
        .await;
        tracing::debug!(addr = %self.local_addr, "listener stopped");
    }
}

/// A failed accept waits one poll interval before retrying
async fn accept_loop<A: Accept>(
    acceptor: &A,
    local_addr: SocketAddr,
    queue: &InboundQueue,
    poll_interval: Duration,
    stats: &Arc<ListenerStats>,
    stop: &StopSignal,
) {
    while !stop.is_raised() {
        let (stream, remote) = match timeout(poll_interval, acceptor.accept()).await {
            Err(_elapsed) => continue,
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                stats.accept_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(addr = %local_addr, "accept error: {}", e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        stats.accepted.fetch_add(1, Ordering::Relaxed);
        let queue = queue.clone();
        let stats = Arc::clone(stats);
        tokio::spawn(async move {
            match read_message(stream).await {
                Ok(Some(message)) => {
                    queue.push(message);
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    tracing::debug!(%remote, "connection closed without payload");
                }
                Err(e) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%remote, "dropping message: {}", e);
                }
            }
        });
    }
}

/// Handle to a running accept loop
pub struct ListenerHandle {
    stop: StopSignal,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
    stats: Arc<ListenerStats>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Ask the accept loop to exit at its next poll boundary
    pub fn stop(&self) {
        self.stop.raise();
    }

    /// Wait for the accept loop to exit
    pub async fn join(self) -> DriftResult<()> {
        self.task
            .await
            .map_err(|e| DriftError::Transport(format!("listener task: {}", e)))
    }

    /// Stop and wait
    pub async fn shutdown(self) -> DriftResult<()> {
        self.stop();
        self.join().await
    }
}

/// Read one connection to end of stream and decode its payload.
/// Returns `None` if the peer closed without sending anything.
pub async fn read_message(mut stream: TcpStream) -> DriftResult<Option<Message>> {
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        let n = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| DriftError::Transport(e.to_string()))?;
        if n == 0 {
            break;
        }
        if buf.len() > MAX_PAYLOAD_SIZE {
            return Err(DriftError::Transport(format!(
                "payload exceeds {} bytes",
                MAX_PAYLOAD_SIZE
            )));
        }
    }

    if buf.is_empty() {
        return Ok(None);
    }
    Message::decode(&buf).map(Some)
}

fn bind_error(addr: SocketAddr, e: io::Error) -> DriftError {
    if e.kind() == io::ErrorKind::AddrInUse {
        DriftError::AddressInUse(addr)
    } else {
        DriftError::Bind {
            addr,
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::NodeId;
    use tokio::io::AsyncWriteExt;

    async fn wait_for_len(queue: &InboundQueue, len: usize) {
        for _ in 0..200 {
            if queue.len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue never reached {} messages", len);
    }

    async fn send_raw(addr: SocketAddr, payload: &[u8]) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(payload).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    /// Acceptor whose every accept fails, as under file descriptor exhaustion
    #[derive(Default)]
    struct FailingAccept {
        calls: AtomicU64,
    }

    impl Accept for FailingAccept {
        fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
            self.calls.fetch_add(1, Ordering::Relaxed);
            std::future::ready(Err(io::Error::other("too many open files")))
        }
    }

    #[tokio::test]
    async fn test_accept_errors_back_off_for_poll_interval() {
        let acceptor = FailingAccept::default();
        let stats = Arc::new(ListenerStats::default());
        let queue = InboundQueue::new();
        let stop = StopSignal::new();
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let raise = async {
            tokio::time::sleep(Duration::from_millis(220)).await;
            stop.raise();
        };
        tokio::join!(
            accept_loop(&acceptor, addr, &queue, Duration::from_millis(50), &stats, &stop),
            raise
        );

        // One attempt per poll interval rather than a busy loop
        let calls = acceptor.calls.load(Ordering::Relaxed);
        assert!((2..=6).contains(&calls), "{} accept attempts", calls);
        assert_eq!(stats.accept_errors(), calls);
        assert_eq!(stats.accepted(), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_listener_bind() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), InboundQueue::new())
            .await
            .unwrap();

        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_twice_is_address_in_use() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), InboundQueue::new())
            .await
            .unwrap();
        let addr = first.local_addr();

        let second = Listener::bind(addr, InboundQueue::new()).await;
        assert!(matches!(second, Err(DriftError::AddressInUse(a)) if a == addr));
    }

    #[tokio::test]
    async fn test_one_message_per_connection() {
        let queue = InboundQueue::new();
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), queue.clone())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .spawn();

        send_raw(handle.local_addr(), br#"{"sender":1,"clock":7}"#).await;
        wait_for_len(&queue, 1).await;

        assert_eq!(queue.pop(), Some((Message::new(NodeId::new(1), 7), 0)));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_payload_split_across_writes() {
        let queue = InboundQueue::new();
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), queue.clone())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .spawn();

        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        stream.write_all(br#"{"sender":"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.write_all(br#"3,"clock":12}"#).await.unwrap();
        stream.shutdown().await.unwrap();

        wait_for_len(&queue, 1).await;
        assert_eq!(queue.pop().unwrap().0, Message::new(NodeId::new(3), 12));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_payload_without_sender_is_delivered() {
        let queue = InboundQueue::new();
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), queue.clone())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .spawn();

        send_raw(handle.local_addr(), br#"{"clock":3}"#).await;

        wait_for_len(&queue, 1).await;
        assert_eq!(queue.pop().unwrap().0, Message::anonymous(3));
        assert_eq!(handle.stats().dropped(), 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let queue = InboundQueue::new();
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), queue.clone())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .spawn();
        let stats = handle.stats();

        send_raw(handle.local_addr(), b"garbage").await;
        send_raw(handle.local_addr(), b"").await;
        send_raw(handle.local_addr(), br#"{"sender":2,"clock":1}"#).await;
        wait_for_len(&queue, 1).await;

        for _ in 0..100 {
            if stats.dropped() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.dropped(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().0.sender, Some(NodeId::new(2)));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_within_poll_interval() {
        let handle = Listener::bind("127.0.0.1:0".parse().unwrap(), InboundQueue::new())
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(50))
            .spawn();

        handle.stop();
        let joined = timeout(Duration::from_secs(2), handle.join()).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }
}
