//! The seam between the cluster client and the network.

use crate::error::{ClientError, ClientResult};
use crate::wire::{CompareAndSetKeyValueRequest, SetKeyValueRequest};
use async_trait::async_trait;
use keylock_core::{Command, CommandHandle};
use serde_json::Value;

/// HTTP method of a cluster request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A request addressed to whichever node is currently believed to lead.
///
/// The address is supplied per attempt, so the same request is replayed
/// unchanged across rotations and redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRequest {
    /// HTTP method
    pub method: Method,
    /// Path including the leading slash
    pub path: String,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl ClusterRequest {
    /// Request submitting `command` to the leader
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be encoded
    pub fn for_command(command: &Command) -> ClientResult<Self> {
        let path = format!("/key/{}", urlencoding::encode(command.key()));
        let request = match command {
            Command::Set { value, .. } => Self {
                method: Method::Post,
                path,
                body: Some(encode(&SetKeyValueRequest {
                    value: value.clone(),
                })?),
            },
            Command::CompareAndSet {
                old_value,
                new_value,
                ..
            } => Self {
                method: Method::Patch,
                path,
                body: Some(encode(&CompareAndSetKeyValueRequest {
                    old_value: old_value.clone(),
                    new_value: new_value.clone(),
                })?),
            },
            Command::Delete { .. } => Self {
                method: Method::Delete,
                path,
                body: None,
            },
            Command::Get { .. } => Self {
                method: Method::Get,
                path,
                body: None,
            },
        };
        Ok(request)
    }

    /// Request polling the status of a submitted command
    #[must_use]
    pub fn command_status(handle: &CommandHandle) -> Self {
        Self {
            method: Method::Get,
            path: format!("/command/{}", handle),
            body: None,
        }
    }
}

fn encode<T: serde::Serialize>(dto: &T) -> ClientResult<Value> {
    serde_json::to_value(dto).map_err(ClientError::Encode)
}

/// Raw reply from a node that was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl ClusterResponse {
    /// Build a response
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a JSON response
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The node could not be reached; the client rotates to the next node
    #[error("node {address} unreachable: {reason}")]
    Unreachable {
        /// Address attempted
        address: String,
        /// Cause
        reason: String,
    },

    /// The node answered but the body could not be read
    #[error("failed to read body from {address}: {reason}")]
    Body {
        /// Address attempted
        address: String,
        /// Cause
        reason: String,
    },
}

/// One request/response exchange with one node.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `request` to the node at `address`
    ///
    /// Any HTTP status counts as a reply. Only failing to reach the node
    /// should be reported as [`TransportError::Unreachable`].
    async fn send(
        &self,
        address: &str,
        request: &ClusterRequest,
    ) -> Result<ClusterResponse, TransportError>;
}
