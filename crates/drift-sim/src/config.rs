//! Simulation configuration

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use drift_core::{DriftError, DriftResult, NodeId};
use drift_runtime::{log_file_name, ActionWeights, NodeConfig, DEFAULT_BASE_PORT};
use drift_transport::{Peer, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Simulation-wide settings, handed to every node's constructor
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Number of nodes, ids `0..nodes`
    pub nodes: u64,
    /// Host every node binds and connects to
    pub host: String,
    /// Node `n` listens on `base_port + n`
    pub base_port: u16,
    /// Tick rates are drawn uniformly from `min_tick_rate..=max_tick_rate`
    pub min_tick_rate: u32,
    pub max_tick_rate: u32,
    pub duration: Duration,
    /// Directory holding `machine_<id>.log`
    pub log_dir: PathBuf,
    pub seed: Option<u64>,
    pub weights: ActionWeights,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            nodes: 3,
            host: "localhost".to_string(),
            base_port: DEFAULT_BASE_PORT,
            min_tick_rate: 1,
            max_tick_rate: 6,
            duration: Duration::from_secs(60),
            log_dir: PathBuf::from("."),
            seed: None,
            weights: ActionWeights::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SimulationConfig {
    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    pub fn with_tick_rates(mut self, min: u32, max: u32) -> Self {
        self.min_tick_rate = min;
        self.max_tick_rate = max;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn validate(&self) -> DriftResult<()> {
        if self.nodes == 0 {
            return Err(DriftError::InvalidConfig("at least one node is required".into()));
        }
        if self.min_tick_rate == 0 || self.min_tick_rate > self.max_tick_rate {
            return Err(DriftError::InvalidConfig(format!(
                "tick rate range {}..={} must be positive and non-empty",
                self.min_tick_rate, self.max_tick_rate
            )));
        }
        if self.duration.is_zero() {
            return Err(DriftError::InvalidConfig("duration must be positive".into()));
        }
        let last = NodeId::new(self.nodes - 1);
        if last.port(self.base_port).is_none() {
            return Err(DriftError::InvalidConfig(format!(
                "base port {} + {} nodes exceeds the port range",
                self.base_port, self.nodes
            )));
        }
        self.host_ip()?;
        Ok(())
    }

    /// Resolve `host`, preferring IPv4
    pub fn host_ip(&self) -> DriftResult<IpAddr> {
        let resolved: Vec<SocketAddr> = (self.host.as_str(), 0)
            .to_socket_addrs()
            .map_err(|e| DriftError::InvalidConfig(format!("host {:?}: {}", self.host, e)))?
            .collect();

        resolved
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| resolved.first())
            .map(|addr| addr.ip())
            .ok_or_else(|| DriftError::InvalidConfig(format!("host {:?} did not resolve", self.host)))
    }

    /// `(host, base_port + id)`
    pub fn node_addr(&self, ip: IpAddr, id: NodeId) -> DriftResult<SocketAddr> {
        let port = id
            .port(self.base_port)
            .ok_or_else(|| DriftError::InvalidConfig(format!("no port for node {}", id)))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Every other node, in ascending id order
    pub fn peer_table(&self, ip: IpAddr, id: NodeId) -> DriftResult<Vec<Peer>> {
        (0..self.nodes)
            .map(NodeId::new)
            .filter(|peer| *peer != id)
            .map(|peer| Ok(Peer::new(peer, self.node_addr(ip, peer)?)))
            .collect()
    }

    /// Constructor arguments for one node
    pub fn node_config(&self, ip: IpAddr, id: NodeId, tick_rate: u32) -> DriftResult<NodeConfig> {
        let mut config = NodeConfig::new(id, tick_rate, self.peer_table(ip, id)?, self.duration)
            .with_bind_addr(self.node_addr(ip, id)?)
            .with_log_path(self.log_dir.join(log_file_name(id)))
            .with_poll_interval(self.poll_interval)
            .with_connect_timeout(self.connect_timeout)
            .with_weights(self.weights);
        if let Some(seed) = self.seed {
            // Distinct, reproducible stream per node
            config = config.with_seed(seed.wrapping_add(id.as_u64()));
        }
        Ok(config)
    }
}
