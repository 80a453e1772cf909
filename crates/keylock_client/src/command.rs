//! Command execution: submit to the leader, then poll until resolved.
//!
//! Three outcomes are kept apart. Availability and protocol failures are
//! `Err`. A command the cluster evaluated but did not apply is
//! `Ok(CommandOutcome::Rejected)`. An applied command is
//! `Ok(CommandOutcome::Applied)`.

use crate::cluster::{ClusterClient, decode};
use crate::error::{ClientError, ClientResult};
use crate::transport::ClusterRequest;
use crate::wire::{CommandResponse, CommandStatusResponse};
use keylock_core::{Command, CommandExecutionInfo, CommandHandle, CommandOutcome};
use serde_json::Value;
use std::future::Future;
use tokio::time::Instant;
use tracing::debug;

impl ClusterClient {
    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is unavailable, rejects the request,
    /// or the configured command deadline passes.
    pub async fn set_key_value(&self, key: &str, value: Value) -> ClientResult<CommandOutcome> {
        self.execute(Command::set(key, value)).await
    }

    /// Replace `old_value` with `new_value` if `key` currently holds `old_value`.
    ///
    /// Returns whether the swap applied. A precondition mismatch is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is unavailable, rejects the request,
    /// or the configured command deadline passes.
    pub async fn compare_and_set_key_value(
        &self,
        key: &str,
        old_value: Value,
        new_value: Value,
    ) -> ClientResult<bool> {
        let outcome = self
            .execute(Command::compare_and_set(key, old_value, new_value))
            .await?;
        if let CommandOutcome::Rejected(reason) = &outcome {
            debug!(key, %reason, "compare-and-set not applied");
        }
        Ok(outcome.is_applied())
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is unavailable, rejects the request,
    /// or the configured command deadline passes.
    pub async fn delete_key_value(&self, key: &str) -> ClientResult<CommandOutcome> {
        self.execute(Command::delete(key)).await
    }

    /// Read `key`. The value is carried by [`CommandOutcome::Applied`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster is unavailable, rejects the request,
    /// or the configured command deadline passes.
    pub async fn get_key_value(&self, key: &str) -> ClientResult<CommandOutcome> {
        self.execute(Command::get(key)).await
    }

    /// Submit `command` and wait for it under the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::execute_until`].
    pub async fn execute(&self, command: Command) -> ClientResult<CommandOutcome> {
        let deadline = self.command_timeout.map(|timeout| Instant::now() + timeout);
        self.execute_until(&command, deadline).await
    }

    /// Submit `command` and wait for it, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] once `deadline` passes, or any error
    /// from the underlying exchanges.
    pub async fn execute_until(
        &self,
        command: &Command,
        deadline: Option<Instant>,
    ) -> ClientResult<CommandOutcome> {
        self.wait_for_command_execution(|| self.execute_command(command), deadline)
            .await
    }

    /// Submit `command` to the leader and return its request identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply carries no
    /// request identifier.
    pub async fn execute_command(&self, command: &Command) -> ClientResult<CommandHandle> {
        let request = ClusterRequest::for_command(command)?;
        let body = self.perform(&request).await?;
        let response: CommandResponse = decode(&body, "command response")?;

        debug!(
            verb = %command.verb(),
            key = command.key(),
            request_id = %response.request_id,
            "command accepted"
        );
        Ok(CommandHandle::new(response.request_id))
    }

    /// Fetch the execution record of a submitted command.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply is malformed.
    pub async fn command_execution_info(
        &self,
        handle: &CommandHandle,
    ) -> ClientResult<CommandExecutionInfo> {
        let body = self.perform(&ClusterRequest::command_status(handle)).await?;
        let response: CommandStatusResponse = decode(&body, "command status")?;
        Ok(response.info)
    }

    /// Obtain a handle from `submit`, then poll until the command resolves.
    ///
    /// Each poll waits the execution timeout first. No exchange is held
    /// between polls, so other callers interleave freely.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] once `deadline` passes, or any error
    /// from submission or polling.
    pub async fn wait_for_command_execution<F, Fut>(
        &self,
        submit: F,
        deadline: Option<Instant>,
    ) -> ClientResult<CommandOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<CommandHandle>>,
    {
        let handle = within(deadline, "command submission", submit()).await?;
        let mut polls = 0u64;

        loop {
            let wake = Instant::now() + self.execution_timeout;
            tokio::time::sleep_until(deadline.map_or(wake, |deadline| wake.min(deadline))).await;
            polls += 1;

            let info = within(deadline, "command status", self.command_execution_info(&handle)).await?;
            if let Some(outcome) = info.outcome() {
                debug!(request_id = %handle, polls, applied = outcome.is_applied(), "command resolved");
                return Ok(outcome);
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ClientError::Timeout {
                    operation: format!("command {}", handle),
                });
            }
            debug!(request_id = %handle, polls, "command not applied yet");
        }
    }
}

/// Bound `operation` by an optional deadline.
async fn within<T, F>(deadline: Option<Instant>, operation: &str, operation_future: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    match deadline {
        None => operation_future.await,
        Some(deadline) => tokio::time::timeout_at(deadline, operation_future)
            .await
            .map_err(|_| ClientError::Timeout {
                operation: operation.to_string(),
            })?,
    }
}
