//! Leader-following exchanges with the cluster.
//!
//! Every request goes to the node currently believed to lead. A node that
//! cannot be reached is skipped in rotation order; a node that answers but
//! is not the leader names the leader, which is tried next. Reaching any
//! node resets the rotation count, so only a full rotation of unreachable
//! nodes is reported as an offline cluster.
//!
//! The leader belief is a shared hint. Exchanges snapshot it, walk their own
//! cursor, and publish what they learn. Rotations are published with a
//! compare-and-swap so a stale exchange never overwrites a newer hint.

use crate::error::{ClientError, ClientResult};
use crate::http::HttpTransport;
use crate::transport::{ClusterRequest, Transport, TransportError};
use crate::wire::{ErrorResponse, LeaderInfo};
use keylock_core::{ClientConfig, NodeSet};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const BAD_REQUEST: u16 = 400;

/// Client session for one cluster.
///
/// Created once and shared (e.g. behind an `Arc`) by every caller in the
/// process.
pub struct ClusterClient {
    /// Known nodes in rotation order.
    nodes: NodeSet,
    /// Network seam.
    transport: Arc<dyn Transport>,
    /// Index of the node believed to lead.
    leader_hint: AtomicUsize,
    /// Present when exchanges are serialized.
    exchange_gate: Option<Mutex<()>>,
    /// Poll interval and settle delay.
    pub(crate) execution_timeout: Duration,
    /// Default deadline for submit-and-poll.
    pub(crate) command_timeout: Option<Duration>,
    /// Redirect cap per exchange.
    max_redirects: u32,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("nodes", &self.nodes)
            .field("leader_hint", &self.leader_hint)
            .field("serialized", &self.exchange_gate.is_some())
            .field("execution_timeout", &self.execution_timeout)
            .finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Create a client speaking HTTP to the configured nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<Self> {
        config.validate()?;
        let nodes = config.node_set()?;

        Ok(Self {
            nodes,
            transport,
            leader_hint: AtomicUsize::new(0),
            exchange_gate: config.serialize_exchanges.then(|| Mutex::new(())),
            execution_timeout: config.execution_timeout(),
            command_timeout: config.command_timeout(),
            max_redirects: config.max_redirects,
        })
    }

    /// Known nodes.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// Index of the node currently believed to lead.
    pub fn leader_index(&self) -> usize {
        self.leader_hint.load(Ordering::Acquire)
    }

    /// Address of the node currently believed to lead.
    pub fn leader_address(&self) -> &str {
        self.address(self.leader_index())
    }

    fn address(&self, index: usize) -> &str {
        self.nodes.address(index).unwrap_or_default()
    }

    /// Run one leader-following exchange and return the leader's reply body.
    pub(crate) async fn perform(&self, request: &ClusterRequest) -> ClientResult<Vec<u8>> {
        let _exclusive = match &self.exchange_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let mut index = self.leader_hint.load(Ordering::Acquire);
        let mut rotations = 0usize;
        let mut redirects = 0u32;

        loop {
            if rotations >= self.nodes.len() {
                warn!(attempts = rotations, "full rotation found no reachable node");
                return Err(ClientError::ClusterOffline {
                    attempts: rotations,
                });
            }

            let address = self.address(index);
            let response = match self.transport.send(address, request).await {
                Ok(response) => response,
                Err(TransportError::Unreachable { reason, .. }) => {
                    let next = self.nodes.next_index(index);
                    warn!(address, %reason, next = self.address(next), "node unreachable, rotating");
                    // Losing the race means another exchange already published a newer hint.
                    let _ = self.leader_hint.compare_exchange(
                        index,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    index = next;
                    rotations += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            // Reachability, not leadership, resets the rotation.
            rotations = 0;

            if response.status == BAD_REQUEST {
                let rejection: ErrorResponse = decode(&response.body, "400 response")?;
                return Err(ClientError::BadRequest(rejection.error));
            }

            let leader: LeaderInfo = decode(&response.body, "leader envelope")?;
            if leader.leader_id.is_empty() {
                debug!(address, "contacted node knows no leader");
                return Err(ClientError::NoLeaderElected);
            }

            if !leader.is_leader {
                redirects += 1;
                if redirects > self.max_redirects {
                    return Err(ClientError::RedirectLoop {
                        redirects: self.max_redirects,
                    });
                }
                let Some(target) = self.nodes.index_of(&leader.leader_id) else {
                    warn!(address, leader_id = %leader.leader_id, "redirect to unknown node");
                    return Err(ClientError::UnknownLeader(leader.leader_id));
                };
                debug!(from = address, leader_id = %leader.leader_id, "following leader redirect");
                self.leader_hint.store(target, Ordering::Release);
                index = target;
                continue;
            }

            self.leader_hint.store(index, Ordering::Release);
            return Ok(response.body);
        }
    }
}

/// Decode a cluster reply, logging contract violations loudly.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8], context: &'static str) -> ClientResult<T> {
    serde_json::from_slice(body).map_err(|source| {
        error!(context, %source, "cluster reply violates the protocol");
        ClientError::Decode { context, source }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ClusterResponse, Method};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::{HashMap, VecDeque};

    type Reply = Result<ClusterResponse, TransportError>;

    /// Replies queued per address; an empty queue means unreachable.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: std::sync::Mutex<HashMap<String, VecDeque<Reply>>>,
        journal: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn reply(&self, address: &str, reply: Reply) {
            self.replies
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .push_back(reply);
        }

        fn json(&self, address: &str, status: u16, body: Value) {
            self.reply(address, Ok(ClusterResponse::json(status, &body)));
        }

        fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, address: &str, _request: &ClusterRequest) -> Reply {
            self.journal.lock().unwrap().push(address.to_string());
            self.replies
                .lock()
                .unwrap()
                .get_mut(address)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Err(TransportError::Unreachable {
                        address: address.to_string(),
                        reason: "connection refused".to_string(),
                    })
                })
        }
    }

    fn client(transport: Arc<ScriptedTransport>, nodes: usize) -> ClusterClient {
        let mut builder = ClientConfig::builder();
        for i in 0..nodes {
            builder = builder.node(format!("n{}", i), format!("a{}", i));
        }
        ClusterClient::with_transport(&builder.build().unwrap(), transport).unwrap()
    }

    fn probe() -> ClusterRequest {
        ClusterRequest {
            method: Method::Get,
            path: "/key/k".to_string(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_leader_answers_directly() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a0", 200, json!({"isLeader": true, "leaderId": "n0", "requestId": "r1"}));
        let client = client(transport.clone(), 3);

        let body = client.perform(&probe()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["requestId"], "r1");
        assert_eq!(transport.journal(), vec!["a0"]);
    }

    #[tokio::test]
    async fn test_all_unreachable_is_offline_after_one_rotation() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone(), 3);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::ClusterOffline { attempts: 3 }));
        assert_eq!(transport.journal(), vec!["a0", "a1", "a2"]);
    }

    #[tokio::test]
    async fn test_redirect_goes_straight_to_named_leader() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a0", 200, json!({"isLeader": false, "leaderId": "n2"}));
        transport.json("a2", 200, json!({"isLeader": true, "leaderId": "n2"}));
        let client = client(transport.clone(), 3);

        client.perform(&probe()).await.unwrap();
        assert_eq!(transport.journal(), vec!["a0", "a2"]);
        assert_eq!(client.leader_index(), 2);
        assert_eq!(client.leader_address(), "a2");
    }

    #[tokio::test]
    async fn test_redirect_does_not_count_as_rotation() {
        // a0 is down and a1 first redirects back to it. Reaching a1 resets
        // the count, so the second miss on a0 does not exhaust the rotation.
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a1", 200, json!({"isLeader": false, "leaderId": "n0"}));
        transport.json("a1", 200, json!({"isLeader": true, "leaderId": "n1"}));
        let client = client(transport.clone(), 3);

        client.perform(&probe()).await.unwrap();
        assert_eq!(transport.journal(), vec!["a0", "a1", "a0", "a1"]);
        assert_eq!(client.leader_index(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a0", 400, json!({"error": "bad key"}));
        let client = client(transport.clone(), 3);

        let err = client.perform(&probe()).await.unwrap_err();
        match err {
            ClientError::BadRequest(message) => assert_eq!(message, "bad key"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
        assert_eq!(transport.journal(), vec!["a0"]);
        assert_eq!(client.leader_index(), 0);
    }

    #[tokio::test]
    async fn test_empty_leader_id_is_no_leader() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a0", 200, json!({"isLeader": false, "leaderId": ""}));
        let client = client(transport, 2);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::NoLeaderElected));
    }

    #[tokio::test]
    async fn test_unknown_leader_is_protocol_error() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a0", 200, json!({"isLeader": false, "leaderId": "n99"}));
        let client = client(transport, 2);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownLeader(id) if id == "n99"));
        assert_eq!(client.leader_index(), 0);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_capped() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..64 {
            transport.json("a0", 200, json!({"isLeader": false, "leaderId": "n1"}));
            transport.json("a1", 200, json!({"isLeader": false, "leaderId": "n0"}));
        }
        let client = client(transport.clone(), 2);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::RedirectLoop { redirects: 32 }));
        assert_eq!(transport.journal().len(), 33);
    }

    #[tokio::test]
    async fn test_garbage_envelope_is_decode_error() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply("a0", Ok(ClusterResponse::new(200, "<html>")));
        let client = client(transport, 1);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { context: "leader envelope", .. }));
    }

    #[tokio::test]
    async fn test_body_failure_is_not_rotated() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply(
            "a0",
            Err(TransportError::Body {
                address: "a0".to_string(),
                reason: "reset".to_string(),
            }),
        );
        let client = client(transport.clone(), 2);

        let err = client.perform(&probe()).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Body { .. })));
        assert_eq!(transport.journal(), vec!["a0"]);
    }

    #[tokio::test]
    async fn test_rotation_updates_hint() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.json("a1", 200, json!({"isLeader": true, "leaderId": "n1"}));
        let client = client(transport, 3);

        client.perform(&probe()).await.unwrap();
        assert_eq!(client.leader_index(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClientConfig::default();
        let result = ClusterClient::with_transport(&config, Arc::new(ScriptedTransport::default()));
        assert!(matches!(result, Err(ClientError::Core(_))));
    }
}
