use crate::chord::actor::NodeHandle;
use crate::chord::id::Identifier;
use crate::chord::lookup::LookupStep;
use crate::chord::types::{Key, NodeRef, Value};
use crate::error::ChordError;
use crate::net::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-process loopback transport: a registry of node handles keyed by ring
/// identifier. Stands where a wire transport would; deregistering a node
/// makes it unreachable, which is how tests exercise failure paths.
pub struct LocalTransport {
    peers: RwLock<HashMap<Identifier, NodeHandle>>,
    rpc_timeout: Duration,
}

impl LocalTransport {
    pub fn new(rpc_timeout: Duration) -> Self {
        LocalTransport {
            peers: RwLock::new(HashMap::new()),
            rpc_timeout,
        }
    }

    pub async fn register(&self, handle: NodeHandle) {
        self.peers.write().await.insert(handle.id(), handle);
    }

    /// Removes a peer from the registry; subsequent calls to it fail with
    /// `NodeUnreachable`. Returns whether the peer was present.
    pub async fn deregister(&self, id: Identifier) -> bool {
        self.peers.write().await.remove(&id).is_some()
    }

    async fn peer(&self, target: &NodeRef) -> Result<NodeHandle, ChordError> {
        self.peers
            .read()
            .await
            .get(&target.id)
            .cloned()
            .ok_or_else(|| ChordError::NodeUnreachable(target.addr.clone()))
    }

    async fn bounded<T>(
        &self,
        target: &NodeRef,
        call: impl Future<Output = Result<T, ChordError>>,
    ) -> Result<T, ChordError> {
        match tokio::time::timeout(self.rpc_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ChordError::ActorStopped)) => {
                Err(ChordError::NodeUnreachable(target.addr.clone()))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ChordError::NodeUnreachable(format!(
                "{}: rpc deadline exceeded",
                target.addr
            ))),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn find_successor(
        &self,
        target: &NodeRef,
        id: Identifier,
        skip: Option<Identifier>,
    ) -> Result<LookupStep, ChordError> {
        let peer = self.peer(target).await?;
        self.bounded(target, peer.next_hop(id, skip)).await
    }

    async fn get_predecessor(&self, target: &NodeRef) -> Result<Option<NodeRef>, ChordError> {
        let peer = self.peer(target).await?;
        self.bounded(target, peer.get_predecessor()).await
    }

    async fn notify(&self, target: &NodeRef, candidate: NodeRef) -> Result<(), ChordError> {
        let peer = self.peer(target).await?;
        self.bounded(target, peer.notify(candidate)).await
    }

    async fn store_at(&self, target: &NodeRef, key: Key, value: Value) -> Result<(), ChordError> {
        let peer = self.peer(target).await?;
        self.bounded(target, peer.put_local(key, value)).await
    }

    async fn lookup_at(&self, target: &NodeRef, key: Key) -> Result<Option<Value>, ChordError> {
        let peer = self.peer(target).await?;
        self.bounded(target, peer.get_local(key)).await
    }
}
