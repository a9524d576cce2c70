//! DRIFT Node - clock, listener, sender, event loop and log behind one identity

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;

use drift_core::{DriftError, DriftResult, NodeId};
use drift_transport::{
    InboundQueue, Listener, ListenerStats, Peer, Sender, SenderStats, StopSignal,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL,
};

use crate::{ActionChooser, ActionWeights, EventLog, EventLoop, LoopReport, WallTicks};

/// Port of node 0; node `n` listens on `DEFAULT_BASE_PORT + n`
pub const DEFAULT_BASE_PORT: u16 = 6000;

/// Log file name for a node
pub fn log_file_name(id: NodeId) -> String {
    format!("machine_{}.log", id)
}

/// DRIFT Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub id: NodeId,
    /// Ticks per second
    pub tick_rate: u32,
    /// Peer table, in send-target order
    pub peers: Vec<Peer>,
    pub run_duration: Duration,
    pub bind_addr: SocketAddr,
    pub log_path: PathBuf,
    /// Listener accept poll bound
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub weights: ActionWeights,
    /// Fixed RNG seed; entropy when `None`
    pub seed: Option<u64>,
}

impl NodeConfig {
    /// Defaults: listen on `127.0.0.1:6000 + id`, log to `machine_<id>.log`
    pub fn new(id: NodeId, tick_rate: u32, peers: Vec<Peer>, run_duration: Duration) -> Self {
        let port = id.port(DEFAULT_BASE_PORT).unwrap_or(0);
        NodeConfig {
            id,
            tick_rate,
            peers,
            run_duration,
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            log_path: PathBuf::from(log_file_name(id)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            weights: ActionWeights::default(),
            seed: None,
        }
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> DriftResult<()> {
        if self.tick_rate == 0 {
            return Err(DriftError::InvalidConfig(format!(
                "node {}: tick rate must be positive",
                self.id
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(DriftError::InvalidConfig(format!(
                "node {}: poll interval must be positive",
                self.id
            )));
        }
        ActionChooser::new(self.weights).map(|_| ())
    }
}

/// A simulated process, not yet started
pub struct Node {
    config: NodeConfig,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        Node { config }
    }

    pub fn id(&self) -> NodeId {
        self.config.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Bind the listener, open the log and start ticking on the current
    /// runtime. Bind and log failures are fatal.
    pub async fn start(self) -> DriftResult<RunningNode> {
        let config = self.config;
        config.validate()?;

        let queue = InboundQueue::new();
        let listener = Listener::bind(config.bind_addr, queue.clone())
            .await?
            .with_poll_interval(config.poll_interval);
        let local_addr = listener.local_addr();
        let log = EventLog::open(&config.log_path)?;
        let chooser = ActionChooser::new(config.weights)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let sender = Sender::with_connect_timeout(config.connect_timeout);
        let sender_stats = sender.stats();
        let listener = listener.spawn();
        let listener_stats = listener.stats();

        let mut event_loop = EventLoop::new(
            config.id,
            config.tick_rate,
            config.peers,
            config.run_duration,
            queue,
            Arc::new(sender),
            log,
            WallTicks::new(),
            rng,
            chooser,
        );
        let stop = event_loop.stop_signal();

        tracing::info!(
            node = %config.id,
            tick_rate = config.tick_rate,
            addr = %local_addr,
            log = %config.log_path.display(),
            "node started"
        );

        let task = tokio::spawn(async move { event_loop.run(Some(listener)).await });

        Ok(RunningNode {
            id: config.id,
            local_addr,
            stop,
            task,
            sender_stats,
            listener_stats,
        })
    }

    /// Start and wait for the run duration to elapse
    pub async fn run(self) -> DriftResult<LoopReport> {
        self.start().await?.wait().await
    }
}

/// A node whose event loop is ticking
pub struct RunningNode {
    id: NodeId,
    local_addr: SocketAddr,
    stop: StopSignal,
    task: JoinHandle<DriftResult<LoopReport>>,
    sender_stats: Arc<SenderStats>,
    listener_stats: Arc<ListenerStats>,
}

impl RunningNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request termination at the next tick boundary
    pub fn stop(&self) {
        self.stop.raise();
    }

    /// Wait for the event loop and listener to finish.
    /// The socket and the log handle are released when this returns.
    pub async fn wait(self) -> DriftResult<LoopReport> {
        let report = self
            .task
            .await
            .map_err(|e| DriftError::NodeFailed(self.id.as_u64(), e.to_string()))??;

        tracing::info!(
            node = %self.id,
            ticks = report.ticks,
            clock = report.final_clock,
            delivered = self.sender_stats.delivered(),
            send_failures = self.sender_stats.failed(),
            inbound = self.listener_stats.delivered(),
            inbound_dropped = self.listener_stats.dropped(),
            "node finished"
        );
        Ok(report)
    }
}
