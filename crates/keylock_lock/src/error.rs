//! Lock errors.

use keylock_client::ClientError;

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Lock errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Initializing the lock key failed
    #[error("failed to create lock {name}: {source}")]
    Creation {
        /// Lock name
        name: String,
        /// Underlying failure
        #[source]
        source: ClientError,
    },

    /// Release attempted by a client that does not hold the lock
    #[error("{client_id} does not own lock {name}: {reason}")]
    NotOwner {
        /// Lock name
        name: String,
        /// Caller
        client_id: String,
        /// Cluster's reason
        reason: String,
    },

    /// Deadline passed before the lock was acquired
    #[error("timed out acquiring lock {name}")]
    Timeout {
        /// Lock name
        name: String,
    },

    /// Stored value is not a lock value
    #[error("lock {name} holds unexpected value {value}")]
    InvalidValue {
        /// Lock name
        name: String,
        /// Stored value as JSON
        value: String,
    },

    /// Cluster failure
    #[error(transparent)]
    Client(#[from] ClientError),
}
