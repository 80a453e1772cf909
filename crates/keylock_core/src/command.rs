//! Commands submitted to the cluster leader and their polled results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// Unconditional write
    Set,
    /// Conditional write
    CompareAndSet,
    /// Remove a key
    Delete,
    /// Read a key
    Get,
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Verb::Set => "set",
            Verb::CompareAndSet => "compare-and-set",
            Verb::Delete => "delete",
            Verb::Get => "get",
        };
        f.write_str(name)
    }
}

/// A mutation or read to apply at the leader.
///
/// Constructed per call and never persisted client-side. `Value::Null`
/// stands for the absent (nil) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Store `value` under `key`
    Set {
        /// Target key
        key: String,
        /// Value to store
        value: Value,
    },
    /// Replace `old_value` with `new_value` if the stored value equals `old_value`
    CompareAndSet {
        /// Target key
        key: String,
        /// Expected stored value
        old_value: Value,
        /// Replacement value
        new_value: Value,
    },
    /// Remove `key`
    Delete {
        /// Target key
        key: String,
    },
    /// Read `key`
    Get {
        /// Target key
        key: String,
    },
}

impl Command {
    /// Build a set command
    #[must_use]
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self::Set {
            key: key.into(),
            value,
        }
    }

    /// Build a compare-and-set command
    #[must_use]
    pub fn compare_and_set(key: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self::CompareAndSet {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    /// Build a delete command
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Build a get command
    #[must_use]
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    /// The command's verb
    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Command::Set { .. } => Verb::Set,
            Command::CompareAndSet { .. } => Verb::CompareAndSet,
            Command::Delete { .. } => Verb::Delete,
            Command::Get { .. } => Verb::Get,
        }
    }

    /// The key the command targets
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. }
            | Command::CompareAndSet { key, .. }
            | Command::Delete { key }
            | Command::Get { key } => key,
        }
    }
}

/// Opaque request identifier returned by the leader on submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandHandle(String);

impl CommandHandle {
    /// Wrap a request identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status record polled for a submitted command.
///
/// `success` is only meaningful once `found` is true, `message` only when
/// `found && !success`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandExecutionInfo {
    /// Whether the leader has produced a result
    #[serde(alias = "Found")]
    pub found: bool,
    /// Whether the command applied without a logical failure
    #[serde(alias = "Success")]
    pub success: bool,
    /// Result payload
    #[serde(alias = "Value")]
    pub value: Value,
    /// Failure reason
    #[serde(alias = "Message")]
    pub message: String,
}

impl CommandExecutionInfo {
    /// Resolved outcome, or `None` while the command is still pending
    #[must_use]
    pub fn outcome(&self) -> Option<CommandOutcome> {
        if !self.found {
            return None;
        }
        if !self.success {
            return Some(CommandOutcome::Rejected(self.message.clone()));
        }
        Some(CommandOutcome::Applied(self.value.clone()))
    }
}

/// Result of a command the cluster evaluated.
///
/// Transport and availability failures never reach this type; they are
/// errors. A `Rejected` command was delivered and evaluated but did not
/// apply, e.g. a compare-and-set whose precondition did not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Applied; carries the result value (meaningful for reads)
    Applied(Value),
    /// Evaluated but not applied; carries the cluster's reason
    Rejected(String),
}

impl CommandOutcome {
    /// Whether the command applied
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied(_))
    }

    /// Result value of an applied command
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            CommandOutcome::Applied(value) => Some(value),
            CommandOutcome::Rejected(_) => None,
        }
    }

    /// Reason of a rejected command
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            CommandOutcome::Applied(_) => None,
            CommandOutcome::Rejected(message) => Some(message),
        }
    }

    /// Consume into the applied value
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            CommandOutcome::Applied(value) => Some(value),
            CommandOutcome::Rejected(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_key_and_verb() {
        let cmd = Command::compare_and_set("lock", Value::Null, json!({"owner": "w1"}));
        assert_eq!(cmd.key(), "lock");
        assert_eq!(cmd.verb(), Verb::CompareAndSet);
        assert_eq!(Command::get("k").verb(), Verb::Get);
        assert_eq!(Command::delete("k").key(), "k");
    }

    #[test]
    fn test_pending_info_has_no_outcome() {
        let info = CommandExecutionInfo {
            found: false,
            success: true,
            value: json!(1),
            message: String::new(),
        };
        assert_eq!(info.outcome(), None);
    }

    #[test]
    fn test_rejected_outcome_carries_message() {
        let info = CommandExecutionInfo {
            found: true,
            success: false,
            value: Value::Null,
            message: "compare failed".to_string(),
        };
        let outcome = info.outcome().unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(outcome.message(), Some("compare failed"));
        assert_eq!(outcome.value(), None);
    }

    #[test]
    fn test_applied_outcome_carries_value() {
        let info = CommandExecutionInfo {
            found: true,
            success: true,
            value: json!(42),
            message: String::new(),
        };
        assert_eq!(info.outcome(), Some(CommandOutcome::Applied(json!(42))));
    }

    #[test]
    fn test_info_decodes_either_case() {
        let camel: CommandExecutionInfo =
            serde_json::from_str(r#"{"found":true,"success":true,"value":7,"message":""}"#).unwrap();
        let pascal: CommandExecutionInfo =
            serde_json::from_str(r#"{"Found":true,"Success":true,"Value":7,"Message":""}"#).unwrap();
        assert_eq!(camel, pascal);
    }

    #[test]
    fn test_info_missing_fields_default() {
        let info: CommandExecutionInfo = serde_json::from_str(r#"{"found":false}"#).unwrap();
        assert!(!info.found);
        assert_eq!(info.value, Value::Null);
    }

    #[test]
    fn test_handle_display() {
        let handle = CommandHandle::new("req-17");
        assert_eq!(handle.to_string(), "req-17");
        assert_eq!(handle.as_str(), "req-17");
    }
}
