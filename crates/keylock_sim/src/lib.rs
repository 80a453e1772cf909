//! keylock cluster simulation
//!
//! An in-process stand-in for the replicated key-value cluster. It speaks
//! the same command/poll protocol as the real nodes through the client's
//! [`Transport`](keylock_client::Transport) seam, and lets tests crash
//! nodes, move leadership, delay command resolution and inject rejections.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod node;
pub mod store;

pub use cluster::{Delivery, SimCluster};
pub use node::{SimNode, SimNodeState};
pub use store::SimStore;
