//! keylock core types
//!
//! This crate contains pure types and logic with no network I/O.
//! Everything the cluster client and the lock share lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod config;
pub mod error;
pub mod node;

// Re-exports
pub use command::{Command, CommandExecutionInfo, CommandHandle, CommandOutcome, Verb};
pub use config::{ClientConfig, ClientConfigBuilder, LockConfig, UnlockMode};
pub use error::{CoreError, CoreResult};
pub use node::{NodeId, NodeSet};
