//! Client and lock configuration.

use crate::error::{CoreError, CoreResult};
use crate::node::NodeSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a cluster client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node addresses in rotation order (e.g., "10.0.0.1:8080").
    pub nodes_addresses: Vec<String>,

    /// Node identifiers, parallel to `nodes_addresses`.
    pub nodes_ids: Vec<String>,

    /// Poll interval for command status, also the settle delay before the
    /// first poll.
    pub execution_timeout_ms: u64,

    /// Timeout for a single HTTP exchange with one node.
    pub request_timeout_ms: u64,

    /// Deadline for submit-and-poll. `None` polls until resolved.
    pub command_timeout_ms: Option<u64>,

    /// Run at most one cluster exchange at a time for this client.
    pub serialize_exchanges: bool,

    /// Consecutive redirects tolerated within one exchange.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes_addresses: Vec::new(),
            nodes_ids: Vec::new(),
            execution_timeout_ms: 10,
            request_timeout_ms: 5_000,
            command_timeout_ms: None,
            serialize_exchanges: false,
            max_redirects: 32,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON, or fails
    /// validation
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Poll interval as a Duration.
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    /// Per-exchange HTTP timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Command deadline as a Duration, if any.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    /// Build the node table described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the node lists are invalid
    pub fn node_set(&self) -> CoreResult<NodeSet> {
        NodeSet::new(self.nodes_addresses.iter().cloned(), self.nodes_ids.iter().cloned())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> CoreResult<()> {
        self.node_set()?;

        if self.execution_timeout_ms == 0 {
            return Err(CoreError::validation("execution_timeout_ms", "must be > 0"));
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::validation("request_timeout_ms", "must be > 0"));
        }
        if self.command_timeout_ms == Some(0) {
            return Err(CoreError::validation("command_timeout_ms", "must be > 0 when set"));
        }

        Ok(())
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Add a node.
    pub fn node(mut self, id: impl Into<String>, address: impl Into<String>) -> Self {
        self.config.nodes_ids.push(id.into());
        self.config.nodes_addresses.push(address.into());
        self
    }

    /// Set all nodes at once from parallel lists.
    pub fn nodes(
        mut self,
        addresses: impl IntoIterator<Item = String>,
        ids: impl IntoIterator<Item = String>,
    ) -> Self {
        self.config.nodes_addresses = addresses.into_iter().collect();
        self.config.nodes_ids = ids.into_iter().collect();
        self
    }

    /// Set the poll interval in milliseconds.
    pub fn execution_timeout_ms(mut self, ms: u64) -> Self {
        self.config.execution_timeout_ms = ms;
        self
    }

    /// Set the per-exchange HTTP timeout in milliseconds.
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the submit-and-poll deadline in milliseconds.
    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = Some(ms);
        self
    }

    /// Serialize all cluster exchanges of the client.
    pub fn serialize_exchanges(mut self, serialize: bool) -> Self {
        self.config.serialize_exchanges = serialize;
        self
    }

    /// Set the redirect cap.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if validation fails
    pub fn build(self) -> CoreResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// What `unlock` reports when the stored owner does not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockMode {
    /// A compare-and-set mismatch is an error
    #[default]
    Strict,
    /// Success whenever the exchange completed, matched or not
    Lenient,
}

/// Configuration for a distributed lock handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Delay between acquisition attempts.
    pub retry_delay_ms: u64,

    /// Release semantics.
    pub unlock_mode: UnlockMode,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 50,
            unlock_mode: UnlockMode::Strict,
        }
    }
}

impl LockConfig {
    /// Retry delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Set the retry delay.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set the unlock mode.
    #[must_use]
    pub fn with_unlock_mode(mut self, mode: UnlockMode) -> Self {
        self.unlock_mode = mode;
        self
    }
}
