//! Local action selection
//!
//! On a tick with an empty inbound queue the node draws one of four actions.
//! The draw is uniform by default (the classic 1-in-4 split) but the weights
//! are configurable.

use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use drift_core::{DriftError, DriftResult};

/// Local action performed on a tick without inbound messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Send to peers[0]
    SendFirst,
    /// Send to peers[1]
    SendSecond,
    /// One clock increment, one message to every peer
    Broadcast,
    /// Clock increment only
    Internal,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::SendFirst,
        Action::SendSecond,
        Action::Broadcast,
        Action::Internal,
    ];
}

/// Relative weights of the four actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionWeights {
    pub send_first: u32,
    pub send_second: u32,
    pub broadcast: u32,
    pub internal: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        ActionWeights::uniform()
    }
}

impl ActionWeights {
    pub fn uniform() -> Self {
        ActionWeights {
            send_first: 1,
            send_second: 1,
            broadcast: 1,
            internal: 1,
        }
    }

    /// All weight on a single action
    pub fn only(action: Action) -> Self {
        ActionWeights {
            send_first: (action == Action::SendFirst) as u32,
            send_second: (action == Action::SendSecond) as u32,
            broadcast: (action == Action::Broadcast) as u32,
            internal: (action == Action::Internal) as u32,
        }
    }

    fn as_array(&self) -> [u32; 4] {
        [self.send_first, self.send_second, self.broadcast, self.internal]
    }
}

impl fmt::Display for ActionWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.send_first, self.send_second, self.broadcast, self.internal
        )
    }
}

/// Parses `first,second,broadcast,internal`, e.g. `1,1,1,1`
impl FromStr for ActionWeights {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| DriftError::InvalidConfig(format!("action weights {:?}: {}", s, e)))?;

        let [send_first, send_second, broadcast, internal] = parts[..] else {
            return Err(DriftError::InvalidConfig(format!(
                "action weights {:?}: expected 4 values, got {}",
                s,
                parts.len()
            )));
        };

        Ok(ActionWeights {
            send_first,
            send_second,
            broadcast,
            internal,
        })
    }
}

/// Sampler over [`Action::ALL`]
#[derive(Clone, Debug)]
pub struct ActionChooser {
    dist: WeightedIndex<u32>,
}

impl ActionChooser {
    /// Rejects an all-zero weight set
    pub fn new(weights: ActionWeights) -> DriftResult<Self> {
        let dist = WeightedIndex::new(weights.as_array())
            .map_err(|e| DriftError::InvalidConfig(format!("action weights {}: {}", weights, e)))?;
        Ok(ActionChooser { dist })
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        Action::ALL[self.dist.sample(rng)]
    }
}
