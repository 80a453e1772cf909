//! Key-value state machine applied by the simulated leader.

use keylock_core::{Command, CommandExecutionInfo};
use serde_json::Value;
use std::collections::HashMap;

/// Replicated key-value state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStore {
    values: HashMap<String, Value>,
}

impl SimStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Apply a command and produce its execution record
    pub fn apply(&mut self, command: &Command) -> CommandExecutionInfo {
        match command {
            Command::Set { key, value } => {
                self.values.insert(key.clone(), value.clone());
                applied(Value::Null)
            }
            Command::CompareAndSet {
                key,
                old_value,
                new_value,
            } => {
                let current = self.values.get(key).cloned().unwrap_or(Value::Null);
                if current == *old_value {
                    self.values.insert(key.clone(), new_value.clone());
                    applied(Value::Null)
                } else {
                    rejected(format!(
                        "compare failed for {}: expected {}, found {}",
                        key, old_value, current
                    ))
                }
            }
            Command::Delete { key } => match self.values.remove(key) {
                Some(_) => applied(Value::Null),
                None => rejected(format!("key {} not found", key)),
            },
            Command::Get { key } => match self.values.get(key) {
                Some(value) => applied(value.clone()),
                None => rejected(format!("key {} not found", key)),
            },
        }
    }
}

fn applied(value: Value) -> CommandExecutionInfo {
    CommandExecutionInfo {
        found: true,
        success: true,
        value,
        message: String::new(),
    }
}

fn rejected(message: String) -> CommandExecutionInfo {
    CommandExecutionInfo {
        found: true,
        success: false,
        value: Value::Null,
        message,
    }
}
