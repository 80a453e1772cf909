//! Simulated cluster answering the command/poll protocol.

use crate::node::{SimNode, SimNodeState};
use crate::store::SimStore;
use async_trait::async_trait;
use keylock_client::wire::{CompareAndSetKeyValueRequest, SetKeyValueRequest};
use keylock_client::{ClusterRequest, ClusterResponse, Method, Transport, TransportError};
use keylock_core::{ClientConfigBuilder, ClientConfig, Command, CommandExecutionInfo};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::trace;

/// One request as seen by the simulated network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Address the client targeted
    pub address: String,
    /// HTTP method
    pub method: Method,
    /// Request path
    pub path: String,
    /// Whether a running node received it
    pub delivered: bool,
}

/// Command accepted by the leader, revealed to pollers after a delay
#[derive(Debug, Clone)]
struct CommandRecord {
    info: CommandExecutionInfo,
    pending_polls: u32,
}

#[derive(Debug, Default)]
struct SimState {
    nodes: Vec<SimNode>,
    leader: Option<usize>,
    store: SimStore,
    commands: HashMap<String, CommandRecord>,
    next_request: u64,
    pending_polls: u32,
    rejected_keys: HashMap<String, String>,
    latency: Duration,
    journal: Vec<Delivery>,
}

/// In-process cluster
pub struct SimCluster {
    state: RwLock<SimState>,
}

impl SimCluster {
    /// Create `count` running nodes `n1..=count`, with `n1` leading
    #[must_use]
    pub fn new(count: usize) -> Self {
        let nodes = (1..=count)
            .map(|i| SimNode::new(format!("n{}", i), format!("10.0.0.{}:8080", i)))
            .collect::<Vec<_>>();
        let leader = (!nodes.is_empty()).then_some(0);

        Self {
            state: RwLock::new(SimState {
                nodes,
                leader,
                ..SimState::default()
            }),
        }
    }

    /// Client configuration builder pointing at every node, polling every millisecond
    pub async fn config_builder(&self) -> ClientConfigBuilder {
        let state = self.state.read().await;
        state
            .nodes
            .iter()
            .fold(ClientConfig::builder(), |builder, node| {
                builder.node(node.id.as_str(), node.address.clone())
            })
            .execution_timeout_ms(1)
    }

    /// Address of node `id`
    pub async fn address_of(&self, id: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .nodes
            .iter()
            .find(|node| node.id.as_str() == id)
            .map(|node| node.address.clone())
    }

    /// Make `id` the leader
    pub async fn elect(&self, id: &str) {
        let mut state = self.state.write().await;
        state.leader = state.nodes.iter().position(|node| node.id.as_str() == id);
    }

    /// Leave the cluster without a leader
    pub async fn depose(&self) {
        self.state.write().await.leader = None;
    }

    /// Current leader id
    pub async fn leader(&self) -> Option<String> {
        let state = self.state.read().await;
        state
            .leader
            .map(|index| state.nodes[index].id.as_str().to_string())
    }

    /// Crash node `id`
    pub async fn crash(&self, id: &str) {
        self.set_node_state(id, SimNodeState::Crashed).await;
    }

    /// Recover node `id`
    pub async fn recover(&self, id: &str) {
        self.set_node_state(id, SimNodeState::Running).await;
    }

    /// Crash every node
    pub async fn crash_all(&self) {
        let mut state = self.state.write().await;
        for node in &mut state.nodes {
            node.state = SimNodeState::Crashed;
        }
    }

    async fn set_node_state(&self, id: &str, node_state: SimNodeState) {
        let mut state = self.state.write().await;
        if let Some(node) = state.nodes.iter_mut().find(|node| node.id.as_str() == id) {
            node.state = node_state;
        }
    }

    /// Make follower `id` report `leader` as the leader
    pub async fn report_leader(&self, id: &str, leader: impl Into<String>) {
        let leader = leader.into();
        let mut state = self.state.write().await;
        if let Some(node) = state.nodes.iter_mut().find(|node| node.id.as_str() == id) {
            node.reported_leader = Some(leader);
        }
    }

    /// Answer this many status polls with `found=false` before revealing a result
    pub async fn resolve_after_polls(&self, polls: u32) {
        self.state.write().await.pending_polls = polls;
    }

    /// Reject every request for `key` with HTTP 400 and `message`
    pub async fn reject_key(&self, key: impl Into<String>, message: impl Into<String>) {
        self.state
            .write()
            .await
            .rejected_keys
            .insert(key.into(), message.into());
    }

    /// Delay every delivered request
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Stored value of `key`
    pub async fn stored_value(&self, key: &str) -> Option<Value> {
        self.state.read().await.store.get(key).cloned()
    }

    /// Every request seen so far
    pub async fn journal(&self) -> Vec<Delivery> {
        self.state.read().await.journal.clone()
    }

    /// Forget recorded requests
    pub async fn clear_journal(&self) {
        self.state.write().await.journal.clear();
    }

    /// Commands the leader accepted
    pub async fn accepted_commands(&self) -> usize {
        self.state.read().await.commands.len()
    }

    fn handle(state: &mut SimState, index: usize, request: &ClusterRequest) -> ClusterResponse {
        let node_id = state.nodes[index].id.as_str().to_string();

        if state.leader != Some(index) {
            let leader_id = state.nodes[index]
                .reported_leader
                .clone()
                .or_else(|| state.leader.map(|l| state.nodes[l].id.as_str().to_string()))
                .unwrap_or_default();
            return ClusterResponse::json(200, &json!({"isLeader": false, "leaderId": leader_id}));
        }

        if let Some(request_id) = request.path.strip_prefix("/command/") {
            let info = match state.commands.get_mut(request_id) {
                Some(record) if record.pending_polls > 0 => {
                    record.pending_polls -= 1;
                    CommandExecutionInfo::default()
                }
                Some(record) => record.info.clone(),
                None => CommandExecutionInfo::default(),
            };
            return ClusterResponse::json(
                200,
                &json!({"isLeader": true, "leaderId": node_id, "info": info}),
            );
        }

        let command = match parse_command(request) {
            Ok(command) => command,
            Err(message) => return ClusterResponse::json(400, &json!({"error": message})),
        };
        if let Some(message) = state.rejected_keys.get(command.key()) {
            return ClusterResponse::json(400, &json!({"error": message}));
        }

        let info = state.store.apply(&command);
        state.next_request += 1;
        let request_id = format!("req-{}", state.next_request);
        let pending_polls = state.pending_polls;
        state.commands.insert(
            request_id.clone(),
            CommandRecord {
                info,
                pending_polls,
            },
        );
        trace!(node = %node_id, %request_id, verb = %command.verb(), "command applied");

        ClusterResponse::json(
            200,
            &json!({"isLeader": true, "leaderId": node_id, "requestId": request_id}),
        )
    }
}

fn parse_command(request: &ClusterRequest) -> Result<Command, String> {
    let key = request
        .path
        .strip_prefix("/key/")
        .filter(|key| !key.is_empty())
        .ok_or_else(|| format!("unknown route {}", request.path))?;
    let key = urlencoding::decode(key).map_err(|e| e.to_string())?.into_owned();
    let body = request.body.clone().unwrap_or(Value::Null);

    match request.method {
        Method::Post => {
            let dto: SetKeyValueRequest =
                serde_json::from_value(body).map_err(|e| e.to_string())?;
            Ok(Command::set(key, dto.value))
        }
        Method::Patch => {
            let dto: CompareAndSetKeyValueRequest =
                serde_json::from_value(body).map_err(|e| e.to_string())?;
            Ok(Command::compare_and_set(key, dto.old_value, dto.new_value))
        }
        Method::Delete => Ok(Command::delete(key)),
        Method::Get => Ok(Command::get(key)),
    }
}

#[async_trait]
impl Transport for SimCluster {
    async fn send(
        &self,
        address: &str,
        request: &ClusterRequest,
    ) -> Result<ClusterResponse, TransportError> {
        let latency = self.state.read().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;
        let target = state
            .nodes
            .iter()
            .position(|node| node.address == address && node.is_alive());

        state.journal.push(Delivery {
            address: address.to_string(),
            method: request.method,
            path: request.path.clone(),
            delivered: target.is_some(),
        });

        match target {
            Some(index) => Ok(Self::handle(&mut state, index, request)),
            None => Err(TransportError::Unreachable {
                address: address.to_string(),
                reason: "simulated node down".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> ClusterRequest {
        ClusterRequest {
            method: Method::Get,
            path: path.to_string(),
            body: None,
        }
    }

    fn body(response: &ClusterResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_follower_redirects_to_leader() {
        let sim = SimCluster::new(3);
        sim.elect("n3").await;

        let response = sim.send("10.0.0.1:8080", &get("/key/a")).await.unwrap();
        assert_eq!(body(&response), json!({"isLeader": false, "leaderId": "n3"}));
    }

    #[tokio::test]
    async fn test_crashed_node_unreachable() {
        let sim = SimCluster::new(2);
        sim.crash("n1").await;

        let result = sim.send("10.0.0.1:8080", &get("/key/a")).await;
        assert!(matches!(result, Err(TransportError::Unreachable { .. })));
        assert!(!sim.journal().await[0].delivered);
    }

    #[tokio::test]
    async fn test_no_leader_reports_empty_id() {
        let sim = SimCluster::new(2);
        sim.depose().await;

        let response = sim.send("10.0.0.2:8080", &get("/key/a")).await.unwrap();
        assert_eq!(body(&response)["leaderId"], "");
    }

    #[tokio::test]
    async fn test_leader_accepts_and_reveals_after_polls() {
        let sim = SimCluster::new(1);
        sim.resolve_after_polls(1).await;
        let set = ClusterRequest::for_command(&Command::set("k", json!(1))).unwrap();

        let accepted = body(&sim.send("10.0.0.1:8080", &set).await.unwrap());
        let request_id = accepted["requestId"].as_str().unwrap().to_string();
        let status_path = format!("/command/{}", request_id);

        let first = body(&sim.send("10.0.0.1:8080", &get(&status_path)).await.unwrap());
        assert_eq!(first["info"]["found"], false);

        let second = body(&sim.send("10.0.0.1:8080", &get(&status_path)).await.unwrap());
        assert_eq!(second["info"]["found"], true);
        assert_eq!(second["info"]["success"], true);
        assert_eq!(sim.stored_value("k").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_rejected_key_returns_400() {
        let sim = SimCluster::new(1);
        sim.reject_key("k", "bad key").await;

        let response = sim.send("10.0.0.1:8080", &get("/key/k")).await.unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(body(&response), json!({"error": "bad key"}));
        assert_eq!(sim.accepted_commands().await, 0);
    }

    #[tokio::test]
    async fn test_config_builder_lists_all_nodes() {
        let sim = SimCluster::new(3);
        let config = sim.config_builder().await.build().unwrap();
        assert_eq!(config.nodes_ids, vec!["n1", "n2", "n3"]);
        assert_eq!(config.execution_timeout_ms, 1);
    }
}
