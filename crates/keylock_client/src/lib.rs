//! keylock cluster client
//!
//! A location-transparent request/response client for a replicated
//! key-value cluster that only accepts commands at its current leader.
//!
//! # Features
//!
//! - Leader following: redirects reported by followers are chased without
//!   counting as failures
//! - Rotation: unreachable nodes are skipped, a full failed rotation is
//!   reported as [`ClientError::ClusterOffline`]
//! - Command execution: submit a command, then poll its status until the
//!   cluster reports it applied or rejected
//! - Deadlines: every blocking operation has an `_until` form
//!
//! # Example
//!
//! ```no_run
//! use keylock_client::ClusterClient;
//! use keylock_core::ClientConfig;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder()
//!     .node("n1", "10.0.0.1:8080")
//!     .node("n2", "10.0.0.2:8080")
//!     .build()?;
//! let client = ClusterClient::new(&config)?;
//!
//! client.set_key_value("answer", json!(42)).await?;
//! let outcome = client.get_key_value("answer").await?;
//! assert_eq!(outcome.value(), Some(&json!(42)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cluster;
mod command;
mod error;
mod http;
mod transport;
pub mod wire;

pub use cluster::ClusterClient;
pub use error::{ClientError, ClientResult};
pub use http::HttpTransport;
pub use transport::{ClusterRequest, ClusterResponse, Method, Transport, TransportError};
