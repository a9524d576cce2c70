//! Simulation runner

use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use drift_core::{DriftError, DriftResult, NodeId};
use drift_runtime::{LoopReport, Node, NodeConfig};

use crate::SimulationConfig;

/// How one node's run ended
#[derive(Debug)]
pub struct NodeOutcome {
    pub id: NodeId,
    pub tick_rate: u32,
    pub result: DriftResult<LoopReport>,
}

/// Outcome of every node, in id order
#[derive(Debug, Default)]
pub struct SimulationReport {
    pub nodes: Vec<NodeOutcome>,
}

impl SimulationReport {
    pub fn reports(&self) -> impl Iterator<Item = &LoopReport> {
        self.nodes.iter().filter_map(|n| n.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (NodeId, &DriftError)> {
        self.nodes
            .iter()
            .filter_map(|n| n.result.as_ref().err().map(|e| (n.id, e)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// N nodes with randomized tick rates
pub struct Simulation {
    config: SimulationConfig,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> DriftResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Simulation { config, rng })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Draw a tick rate per node and build its configuration
    pub fn node_configs(&mut self) -> DriftResult<Vec<NodeConfig>> {
        let ip = self.config.host_ip()?;
        (0..self.config.nodes)
            .map(|id| {
                let tick_rate = self
                    .rng
                    .gen_range(self.config.min_tick_rate..=self.config.max_tick_rate);
                self.config.node_config(ip, NodeId::new(id), tick_rate)
            })
            .collect()
    }

    /// Run every node for the configured duration and join them.
    /// A failing node is reported without affecting the others.
    pub fn run(mut self) -> DriftResult<SimulationReport> {
        let configs = self.node_configs()?;

        let handles: Vec<_> = configs
            .into_iter()
            .map(|config| {
                let id = config.id;
                let tick_rate = config.tick_rate;
                let handle = thread::Builder::new()
                    .name(format!("drift-node-{}", id))
                    .spawn(move || run_isolated(config))
                    .map_err(|e| DriftError::NodeFailed(id.as_u64(), e.to_string()));
                (id, tick_rate, handle)
            })
            .collect();

        let mut report = SimulationReport::default();
        for (id, tick_rate, handle) in handles {
            let result = handle.and_then(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(DriftError::NodeFailed(id.as_u64(), "panicked".into())))
            });
            match &result {
                Ok(_) => tracing::info!("VM {} finished.", id),
                Err(e) => tracing::error!("VM {} failed: {}", id, e),
            }
            report.nodes.push(NodeOutcome {
                id,
                tick_rate,
                result,
            });
        }

        tracing::info!("Simulation completed.");
        Ok(report)
    }
}

/// One node on its own single-threaded runtime
fn run_isolated(config: NodeConfig) -> DriftResult<LoopReport> {
    let id = config.id;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DriftError::NodeFailed(id.as_u64(), e.to_string()))?;

    tracing::info!(
        "VM {} starting with tick rate {} ticks/sec, listening on port {}.",
        id,
        config.tick_rate,
        config.bind_addr.port()
    );
    runtime.block_on(Node::new(config).run())
}
