//! Lock handle and its compare-and-set transitions.

use crate::error::{LockError, LockResult};
use keylock_client::{ClientError, ClusterClient};
use keylock_core::{Command, CommandOutcome, LockConfig, UnlockMode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Value stored under a held lock's key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockValue {
    /// Client holding the lock
    pub owner: String,
}

impl LockValue {
    /// Lock value for `owner`
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

impl From<LockValue> for Value {
    fn from(value: LockValue) -> Self {
        json!({ "owner": value.owner })
    }
}

/// Local handle to a lock stored in the cluster.
///
/// The stored value outlives the handle; dropping it releases nothing.
#[derive(Debug, Clone)]
pub struct DistributedLock {
    /// Key holding the lock value
    name: String,
    /// Shared cluster session
    client: Arc<ClusterClient>,
    /// Delay between acquisition attempts
    retry_delay: Duration,
    /// Release semantics
    unlock_mode: UnlockMode,
}

impl DistributedLock {
    /// Create a lock, resetting its key to nil.
    ///
    /// Without a name the lock gets a random UUID.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Creation`] if the reset fails at the cluster level
    pub async fn create(
        name: Option<String>,
        client: Arc<ClusterClient>,
        config: LockConfig,
    ) -> LockResult<Self> {
        let name = name.unwrap_or_else(|| Uuid::new_v4().to_string());

        match client.set_key_value(&name, Value::Null).await {
            Ok(CommandOutcome::Applied(_)) => {}
            Ok(CommandOutcome::Rejected(reason)) => {
                warn!(lock = %name, %reason, "lock key reset was not applied");
            }
            Err(source) => return Err(LockError::Creation { name, source }),
        }
        info!(lock = %name, "lock created");

        Ok(Self {
            name,
            client,
            retry_delay: config.retry_delay(),
            unlock_mode: config.unlock_mode,
        })
    }

    /// Handle to an existing lock, leaving its stored value untouched
    #[must_use]
    pub fn open(name: impl Into<String>, client: Arc<ClusterClient>, config: LockConfig) -> Self {
        Self {
            name: name.into(),
            client,
            retry_delay: config.retry_delay(),
            unlock_mode: config.unlock_mode,
        }
    }

    /// Lock name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the lock for `client_id`, retrying until it is free.
    ///
    /// # Errors
    ///
    /// Returns error on cluster failure; contention is never an error
    pub async fn lock(&self, client_id: &str) -> LockResult<()> {
        self.acquire(client_id, None).await
    }

    /// Acquire the lock for `client_id`, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] once `deadline` passes, or any cluster failure
    pub async fn lock_until(&self, client_id: &str, deadline: Instant) -> LockResult<()> {
        self.acquire(client_id, Some(deadline)).await
    }

    /// Make one acquisition attempt.
    ///
    /// # Errors
    ///
    /// Returns error on cluster failure
    pub async fn try_lock(&self, client_id: &str) -> LockResult<bool> {
        self.attempt(client_id, None).await
    }

    async fn acquire(&self, client_id: &str, deadline: Option<Instant>) -> LockResult<()> {
        let mut attempts = 0u64;

        loop {
            attempts += 1;
            if self.attempt(client_id, deadline).await? {
                info!(lock = %self.name, client_id, attempts, "lock acquired");
                return Ok(());
            }

            if deadline.is_some_and(|deadline| Instant::now() + self.retry_delay >= deadline) {
                return Err(LockError::Timeout {
                    name: self.name.clone(),
                });
            }
            debug!(lock = %self.name, client_id, attempts, "lock busy, retrying");
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn attempt(&self, client_id: &str, deadline: Option<Instant>) -> LockResult<bool> {
        let command = Command::compare_and_set(
            self.name.as_str(),
            Value::Null,
            LockValue::new(client_id).into(),
        );
        match self.run(command, deadline).await {
            Ok(outcome) => Ok(outcome.is_applied()),
            Err(err @ LockError::Timeout { .. }) => {
                self.abandon(client_id).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Undo an acquisition whose outcome is unknown.
    ///
    /// The leader orders this release after the timed-out attempt, so the
    /// key ends up free if that attempt landed and is left alone otherwise.
    /// Only the submission is awaited.
    async fn abandon(&self, client_id: &str) {
        let release = Command::compare_and_set(
            self.name.as_str(),
            LockValue::new(client_id).into(),
            Value::Null,
        );
        match self.client.execute_command(&release).await {
            Ok(handle) => {
                debug!(lock = %self.name, client_id, request_id = %handle, "timed-out acquisition withdrawn");
            }
            Err(err) => {
                error!(lock = %self.name, client_id, error = %err, "could not withdraw timed-out acquisition, lock may stay held");
            }
        }
    }

    /// Release the lock held by `client_id`.
    ///
    /// In [`UnlockMode::Lenient`] a release by a non-owner succeeds without
    /// changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotOwner`] in strict mode when `client_id` does
    /// not hold the lock, or any cluster failure
    pub async fn unlock(&self, client_id: &str) -> LockResult<()> {
        let command = Command::compare_and_set(
            self.name.as_str(),
            LockValue::new(client_id).into(),
            Value::Null,
        );

        match (self.run(command, None).await?, self.unlock_mode) {
            (CommandOutcome::Applied(_), _) => {
                info!(lock = %self.name, client_id, "lock released");
                Ok(())
            }
            (CommandOutcome::Rejected(reason), UnlockMode::Lenient) => {
                warn!(lock = %self.name, client_id, %reason, "unlock matched no owner");
                Ok(())
            }
            (CommandOutcome::Rejected(reason), UnlockMode::Strict) => Err(LockError::NotOwner {
                name: self.name.clone(),
                client_id: client_id.to_string(),
                reason,
            }),
        }
    }

    /// Current owner, `None` when unlocked.
    ///
    /// # Errors
    ///
    /// Returns error on cluster failure or if the key holds something other
    /// than a lock value
    pub async fn holder(&self) -> LockResult<Option<String>> {
        match self.client.get_key_value(&self.name).await? {
            CommandOutcome::Applied(Value::Null) => Ok(None),
            CommandOutcome::Applied(value) => serde_json::from_value::<LockValue>(value.clone())
                .map(|lock| Some(lock.owner))
                .map_err(|_| LockError::InvalidValue {
                    name: self.name.clone(),
                    value: value.to_string(),
                }),
            CommandOutcome::Rejected(reason) => {
                debug!(lock = %self.name, %reason, "lock key not readable");
                Ok(None)
            }
        }
    }

    async fn run(&self, command: Command, deadline: Option<Instant>) -> LockResult<CommandOutcome> {
        let result = match deadline {
            Some(deadline) => self.client.execute_until(&command, Some(deadline)).await,
            None => self.client.execute(command).await,
        };
        result.map_err(|err| match err {
            ClientError::Timeout { .. } => LockError::Timeout {
                name: self.name.clone(),
            },
            other => LockError::Client(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_value_shape() {
        let value: Value = LockValue::new("worker-1").into();
        assert_eq!(value, json!({"owner": "worker-1"}));
    }

    #[test]
    fn test_lock_value_roundtrips_through_json() {
        let value: Value = LockValue::new("w").into();
        let decoded: LockValue = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, LockValue::new("w"));
    }
}
