//! JSON bodies exchanged with cluster nodes.
//!
//! Field names are camelCase on the wire. The PascalCase spelling is
//! accepted too since the cluster matches keys case-insensitively.

use keylock_core::CommandExecutionInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /key/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyValueRequest {
    /// Value to store.
    #[serde(alias = "Value", default)]
    pub value: Value,
}

/// Body of `PATCH /key/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareAndSetKeyValueRequest {
    /// Expected stored value.
    #[serde(alias = "OldValue", default)]
    pub old_value: Value,
    /// Replacement value.
    #[serde(alias = "NewValue", default)]
    pub new_value: Value,
}

/// Body of an HTTP 400 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Reason for the rejection.
    #[serde(alias = "Error")]
    pub error: String,
}

/// Leadership fields present in every non-400 reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderInfo {
    /// Whether the responder is the leader.
    #[serde(alias = "IsLeader", default)]
    pub is_leader: bool,
    /// The leader as known to the responder, empty if none.
    #[serde(alias = "LeaderId", default)]
    pub leader_id: String,
}

/// Reply to a command submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Whether the responder is the leader.
    #[serde(alias = "IsLeader", default)]
    pub is_leader: bool,
    /// The leader as known to the responder.
    #[serde(alias = "LeaderId", default)]
    pub leader_id: String,
    /// Identifier to poll with.
    #[serde(alias = "RequestId")]
    pub request_id: String,
}

/// Reply to `GET /command/{requestId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStatusResponse {
    /// Whether the responder is the leader.
    #[serde(alias = "IsLeader", default)]
    pub is_leader: bool,
    /// The leader as known to the responder.
    #[serde(alias = "LeaderId", default)]
    pub leader_id: String,
    /// Execution record.
    #[serde(alias = "Info")]
    pub info: CommandExecutionInfo,
}
