//! Simulated cluster members.

use keylock_core::NodeId;

/// State of a simulated node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimNodeState {
    /// Node answers requests
    Running,
    /// Node is unreachable
    Crashed,
}

/// A simulated node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNode {
    /// Node ID
    pub id: NodeId,
    /// Address clients use to reach it
    pub address: String,
    /// Current state
    pub state: SimNodeState,
    /// Leader this node reports instead of the real one, if set
    pub reported_leader: Option<String>,
}

impl SimNode {
    /// Create a running node
    #[must_use]
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            state: SimNodeState::Running,
            reported_leader: None,
        }
    }

    /// Check if node is reachable
    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self.state, SimNodeState::Running)
    }
}
