//! keylock distributed lock
//!
//! A named lock whose ownership is the value stored under its own key in
//! the cluster. `nil` means unlocked, `{"owner": <client id>}` means held.
//! Both transitions are compare-and-set commands, so the cluster decides
//! every race.
//!
//! Waiters are not queued; each retries after a fixed delay and whoever's
//! compare-and-set lands first wins.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lock;

pub use error::{LockError, LockResult};
pub use lock::{DistributedLock, LockValue};
