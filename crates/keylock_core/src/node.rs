//! Cluster node identifiers and the immutable node table.
//!
//! A [`NodeSet`] pairs every node identifier with its transport address and
//! its position in the ordered address list. Positions are what the client
//! rotates through; identifiers are what the cluster reports back when it
//! redirects to its leader.

use crate::error::{CoreError, CoreResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Node identifier as reported by the cluster in `leaderId`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identifier
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

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, immutable table of cluster nodes.
///
/// Built once from two parallel lists. The id-to-index mapping is a
/// bijection onto `0..len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    nodes: IndexMap<NodeId, String>,
}

impl NodeSet {
    /// Build a node set from parallel address and identifier lists
    ///
    /// # Errors
    ///
    /// Returns error if the lists are empty, differ in length, contain an
    /// empty entry, or repeat an identifier
    pub fn new<A, I>(addresses: A, ids: I) -> CoreResult<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();

        if addresses.is_empty() {
            return Err(CoreError::validation("nodes_addresses", "at least one node is required"));
        }
        if addresses.len() != ids.len() {
            return Err(CoreError::validation(
                "nodes_ids",
                format!(
                    "expected {} identifiers to match the addresses, got {}",
                    addresses.len(),
                    ids.len()
                ),
            ));
        }

        let mut nodes = IndexMap::with_capacity(addresses.len());
        for (id, address) in ids.into_iter().zip(addresses) {
            if id.is_empty() {
                return Err(CoreError::validation("nodes_ids", "identifier must not be empty"));
            }
            if address.is_empty() {
                return Err(CoreError::validation("nodes_addresses", "address must not be empty"));
            }
            if nodes.contains_key(id.as_str()) {
                return Err(CoreError::DuplicateNode { id });
            }
            nodes.insert(NodeId(id), address);
        }

        Ok(Self { nodes })
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a constructed set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Address of the node at `index`
    #[must_use]
    pub fn address(&self, index: usize) -> Option<&str> {
        self.nodes.get_index(index).map(|(_, address)| address.as_str())
    }

    /// Identifier of the node at `index`
    #[must_use]
    pub fn id(&self, index: usize) -> Option<&NodeId> {
        self.nodes.get_index(index).map(|(id, _)| id)
    }

    /// Position of the node with identifier `id`
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    /// Position following `index`, wrapping around
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.nodes.len()
    }

    /// Iterate `(id, address)` pairs in rotation order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &str)> {
        self.nodes.iter().map(|(id, address)| (id, address.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three_nodes() -> NodeSet {
        NodeSet::new(
            ["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.3:8080"],
            ["n1", "n2", "n3"],
        )
        .unwrap()
    }

    #[test]
    fn test_node_set_lookup() {
        let nodes = three_nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.index_of("n2"), Some(1));
        assert_eq!(nodes.address(1), Some("10.0.0.2:8080"));
        assert_eq!(nodes.id(2), Some(&NodeId::new("n3")));
        assert_eq!(nodes.index_of("n9"), None);
        assert_eq!(nodes.address(3), None);
    }

    #[test]
    fn test_next_index_wraps() {
        let nodes = three_nodes();
        assert_eq!(nodes.next_index(0), 1);
        assert_eq!(nodes.next_index(2), 0);
    }

    #[test]
    fn test_single_node_rotates_onto_itself() {
        let nodes = NodeSet::new(["localhost:1"], ["solo"]).unwrap();
        assert_eq!(nodes.next_index(0), 0);
    }

    #[test]
    fn test_empty_rejected() {
        let result = NodeSet::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = NodeSet::new(["a:1", "b:1"], ["a"]);
        assert!(matches!(result, Err(CoreError::Validation { field, .. }) if field == "nodes_ids"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = NodeSet::new(["a:1", "b:1"], ["x", "x"]);
        assert_eq!(result, Err(CoreError::DuplicateNode { id: "x".to_string() }));
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = NodeSet::new(["a:1"], [""]);
        assert!(result.is_err());
    }

    #[test]
    fn test_node_id_serde_transparent() {
        let id = NodeId::new("node-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"node-7\"");
    }

    proptest! {
        #[test]
        fn prop_index_mapping_is_bijection(ids in proptest::collection::hash_set("[a-z]{1,8}", 1..16)) {
            let ids: Vec<String> = ids.into_iter().collect();
            let addresses: Vec<String> = (0..ids.len()).map(|i| format!("10.0.0.{}:80", i)).collect();
            let nodes = NodeSet::new(addresses.clone(), ids.clone()).unwrap();

            prop_assert_eq!(nodes.len(), ids.len());
            for (i, id) in ids.iter().enumerate() {
                prop_assert_eq!(nodes.index_of(id), Some(i));
                prop_assert_eq!(nodes.address(i), Some(addresses[i].as_str()));
                prop_assert_eq!(nodes.id(i).map(NodeId::as_str), Some(id.as_str()));
            }
        }
    }
}
