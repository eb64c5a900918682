//! The node composite: one acceptor, one proposer, one peer list.
//!
//! Most embedders interact with a [`Node`] rather than the roles directly.
//! A node is created around a stable store, optionally given a transport
//! and metadata, then introduced to its cluster once via [`wire_cluster`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::acceptor::Acceptor;
use crate::config::ProposeConfig;
use crate::error::{ChangeError, ProposeError};
use crate::proposer::Proposer;
use crate::store::StableStore;
use crate::transport::{LocalTransport, Transport};

/// A cluster member: proposer and acceptor in one, plus the wiring.
pub struct Node {
    id: u64,
    metadata: RwLock<HashMap<String, String>>,
    proposer: Proposer,
    acceptor: Arc<Acceptor>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    peers: RwLock<Vec<Peer>>,
}

/// A peer handle: the node id and the transport that reaches its acceptor.
/// Self is a peer too, so the fan-out treats local and remote uniformly.
#[derive(Clone)]
pub(crate) struct Peer {
    id: u64,
    transport: Arc<dyn Transport>,
}

impl Peer {
    pub(crate) fn new(id: u64, transport: Arc<dyn Transport>) -> Self {
        Self { id, transport }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }
}

impl Node {
    /// Create a node with the default proposer configuration. The peer list
    /// starts empty; call [`wire_cluster`] before proposing.
    #[must_use]
    pub fn new(id: u64, store: Arc<dyn StableStore>) -> Arc<Self> {
        Self::with_config(id, store, ProposeConfig::default())
    }

    #[must_use]
    pub fn with_config(id: u64, store: Arc<dyn StableStore>, config: ProposeConfig) -> Arc<Self> {
        Arc::new(Self {
            id,
            metadata: RwLock::new(HashMap::new()),
            proposer: Proposer::new(id, config),
            acceptor: Arc::new(Acceptor::new(id, store)),
            transport: RwLock::new(None),
            peers: RwLock::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Install the transport peers use to reach this node's acceptor.
    /// Pre-wiring configuration: peers capture the handle at
    /// [`wire_cluster`] time.
    pub fn add_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().expect("transport lock poisoned") = Some(transport);
    }

    /// Attach operator metadata, e.g. name=node-a, env=production.
    pub fn add_metadata(&self, metadata: HashMap<String, String>) {
        *self.metadata.write().expect("metadata lock poisoned") = metadata;
    }

    #[must_use]
    pub fn metadata(&self) -> HashMap<String, String> {
        self.metadata
            .read()
            .expect("metadata lock poisoned")
            .clone()
    }

    /// This node's acceptor, for embedders serving remote transports.
    #[must_use]
    pub fn acceptor(&self) -> Arc<Acceptor> {
        self.acceptor.clone()
    }

    /// The proposer's current ballot counter (the next proposal exceeds it).
    #[must_use]
    pub fn ballot_counter(&self) -> u64 {
        self.proposer.counter()
    }

    /// Agree on a new value for `key` by applying `change` to the currently
    /// agreed one. Any node of the cluster can serve this.
    ///
    /// # Errors
    ///
    /// See [`ProposeError`]; `Quorum` failures may be retried by calling
    /// again.
    pub async fn propose<F>(&self, key: &[u8], change: F) -> Result<Bytes, ProposeError>
    where
        F: FnOnce(Option<Bytes>) -> Result<Bytes, ChangeError> + Send,
    {
        let peers = self.peers.read().expect("peer lock poisoned").clone();
        self.proposer
            .propose(&peers, Bytes::copy_from_slice(key), change)
            .await
    }

    /// The transport peers should use for this node, defaulting to a local
    /// in-process transport if none was configured.
    fn transport_handle(&self) -> Arc<dyn Transport> {
        let mut slot = self.transport.write().expect("transport lock poisoned");
        slot.get_or_insert_with(|| Arc::new(LocalTransport::new(self.acceptor.clone())))
            .clone()
    }
}

/// Introduce the nodes of a cluster to each other, including themselves.
///
/// Each node's peer list is extended with every node given here, in
/// argument order, deduplicated by node id — so repeated calls are
/// idempotent and the wiring is deterministic. Nodes without a configured
/// transport are given a [`LocalTransport`] over their own acceptor.
pub fn wire_cluster(nodes: &[Arc<Node>]) {
    for node in nodes {
        let mut peers = node.peers.write().expect("peer lock poisoned");
        for other in nodes {
            if peers.iter().any(|peer| peer.id() == other.id) {
                continue;
            }
            peers.push(Peer::new(other.id, other.transport_handle()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn node(id: u64) -> Arc<Node> {
        Node::new(id, Arc::new(MemoryStore::new()))
    }

    fn peer_ids(node: &Node) -> Vec<u64> {
        node.peers
            .read()
            .unwrap()
            .iter()
            .map(Peer::id)
            .collect()
    }

    #[test]
    fn wiring_installs_every_node_including_self() {
        let nodes = [node(1), node(2), node(3)];
        wire_cluster(&nodes);

        for n in &nodes {
            assert_eq!(peer_ids(n), vec![1, 2, 3]);
        }
    }

    #[test]
    fn wiring_twice_is_idempotent() {
        let nodes = [node(1), node(2), node(3)];
        wire_cluster(&nodes);
        wire_cluster(&nodes);

        for n in &nodes {
            assert_eq!(peer_ids(n), vec![1, 2, 3]);
        }
    }

    #[test]
    fn wiring_deduplicates_repeated_handles() {
        let a = node(1);
        let b = node(2);
        let c = node(3);
        wire_cluster(&[a.clone(), b.clone(), a.clone(), c, b.clone()]);

        assert_eq!(peer_ids(&a), vec![1, 2, 3]);
        assert_eq!(peer_ids(&b), vec![1, 2, 3]);
    }

    #[test]
    fn metadata_replaces_wholesale() {
        let n = node(1);
        n.add_metadata(HashMap::from([("env".to_owned(), "test".to_owned())]));
        n.add_metadata(HashMap::from([("name".to_owned(), "node-a".to_owned())]));

        let metadata = n.metadata();
        assert_eq!(metadata.get("name").map(String::as_str), Some("node-a"));
        assert!(!metadata.contains_key("env"));
    }

    #[tokio::test]
    async fn unwired_node_cannot_propose() {
        let n = node(1);
        let err = n.propose(b"k", crate::change::set("v")).await.unwrap_err();
        assert!(matches!(err, ProposeError::InsufficientPeers { got: 0 }));
    }
}
