//! Error types for the cluster client.

use crate::transport::TransportError;
use keylock_core::CoreError;
use thiserror::Error;

/// Errors that can occur when talking to the cluster.
///
/// A command the cluster evaluated but did not apply is not an error; see
/// [`keylock_core::CommandOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// A full rotation found no reachable node.
    #[error("cluster is offline: no node reachable after {attempts} attempts")]
    ClusterOffline {
        /// Consecutive failed attempts.
        attempts: usize,
    },

    /// The contacted node does not know of any leader.
    #[error("cluster has no leader")]
    NoLeaderElected,

    /// The cluster rejected the request (HTTP 400).
    #[error("received bad request: {0}")]
    BadRequest(String),

    /// A node redirected to an identifier outside the known node set.
    #[error("node reported unknown leader id {0:?}")]
    UnknownLeader(String),

    /// Too many redirects within one exchange.
    #[error("gave up after {redirects} leader redirects")]
    RedirectLoop {
        /// Redirects followed.
        redirects: u32,
    },

    /// A response did not match the cluster's envelope.
    #[error("failed to decode {context}: {source}")]
    Decode {
        /// What was being decoded.
        context: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The exchange reached a node but could not complete.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A deadline passed before the operation finished.
    #[error("timed out waiting for {operation}")]
    Timeout {
        /// Operation that timed out.
        operation: String,
    },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_display_keeps_message() {
        let err = ClientError::BadRequest("bad key".to_string());
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_offline_display() {
        let err = ClientError::ClusterOffline { attempts: 3 };
        assert!(err.to_string().contains("offline"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_core_error_converts() {
        let err: ClientError = CoreError::validation("nodes_ids", "empty").into();
        assert!(matches!(err, ClientError::Core(_)));
    }
}
