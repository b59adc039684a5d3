use crate::chord::actor::NodeHandle;
use crate::chord::id::{IdSpace, Identifier};
use crate::chord::types::{ChordConfig, Key, NodeRef, NodeSummary, Value};
use crate::chord::{lookup, workers};
use crate::error::ChordError;
use crate::net::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// One overlay participant: the actor holding its ring state, plus the
/// transport it reaches peers through.
///
/// Created either as the first node of a fresh ring ([`ChordNode::bootstrap`])
/// or by joining through a known peer ([`ChordNode::join`]). Dropping the
/// node closes its mailbox and stops the actor.
pub struct ChordNode {
    handle: NodeHandle,
    space: IdSpace,
    config: ChordConfig,
    transport: Arc<dyn Transport>,
    _actor_task: JoinHandle<()>,
}

impl ChordNode {
    /// Starts the first node of a new ring; its successor is itself and it
    /// owns the entire identifier space until someone joins.
    pub fn bootstrap(
        addr: impl Into<String>,
        config: ChordConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ChordError> {
        let space = IdSpace::new(config.id_bits)?;
        let addr = addr.into();
        let id = space.hash(addr.as_bytes());
        Ok(Self::start(NodeRef::new(id, addr), space, config, transport))
    }

    /// Like [`ChordNode::bootstrap`] but with a caller-chosen ring
    /// position instead of the address hash. Deterministic rings for tests
    /// and demos, or an externally supplied hash function.
    pub fn bootstrap_with_id(
        id: Identifier,
        addr: impl Into<String>,
        config: ChordConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ChordError> {
        let space = IdSpace::new(config.id_bits)?;
        Self::check_id(&space, id)?;
        Ok(Self::start(NodeRef::new(id, addr.into()), space, config, transport))
    }

    /// Joins an existing ring through `entry`: resolves our successor and
    /// builds the full finger table with `entry` as the lookup entry
    /// point. Keys already stored on the new successor are not migrated.
    pub async fn join(
        addr: impl Into<String>,
        config: ChordConfig,
        transport: Arc<dyn Transport>,
        entry: &NodeRef,
    ) -> Result<Self, ChordError> {
        let space = IdSpace::new(config.id_bits)?;
        let addr = addr.into();
        let id = space.hash(addr.as_bytes());
        Self::join_with_id(id, addr, config, transport, entry).await
    }

    /// [`ChordNode::join`] with a caller-chosen ring position.
    pub async fn join_with_id(
        id: Identifier,
        addr: impl Into<String>,
        config: ChordConfig,
        transport: Arc<dyn Transport>,
        entry: &NodeRef,
    ) -> Result<Self, ChordError> {
        let space = IdSpace::new(config.id_bits)?;
        Self::check_id(&space, id)?;
        let node = Self::start(NodeRef::new(id, addr.into()), space, config, transport);
        node.join_ring(entry).await?;
        Ok(node)
    }

    /// Caller-chosen positions outside the ring would break byte-wise
    /// ordering, so they are rejected rather than silently masked.
    fn check_id(space: &IdSpace, id: Identifier) -> Result<(), ChordError> {
        if space.contains(id) {
            Ok(())
        } else {
            Err(ChordError::MalformedIdentifier(format!(
                "identifier {} exceeds the configured {}-bit ring",
                id,
                space.bits()
            )))
        }
    }

    fn start(
        local: NodeRef,
        space: IdSpace,
        config: ChordConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (handle, actor_task) = NodeHandle::spawn(space, local);
        ChordNode {
            handle,
            space,
            config,
            transport,
            _actor_task: actor_task,
        }
    }

    async fn join_ring(&self, entry: &NodeRef) -> Result<(), ChordError> {
        let local = self.handle.node_ref();
        if entry.id == local.id {
            return Err(ChordError::JoinFailed(format!(
                "node {} cannot join through itself",
                local
            )));
        }
        info!(node = %local, entry = %entry, "joining ring");

        let successor = lookup::find_successor_from(
            self.transport.as_ref(),
            &self.handle,
            entry,
            local.id,
            &self.config,
        )
        .await
        .map_err(|e| {
            ChordError::JoinFailed(format!(
                "could not resolve successor through {}: {}",
                entry.addr, e
            ))
        })?;
        self.handle.set_successor(successor).await?;

        for i in 0..self.space.bits() {
            let target = self.space.add_pow2(local.id, i);
            let finger = lookup::find_successor_from(
                self.transport.as_ref(),
                &self.handle,
                entry,
                target,
                &self.config,
            )
            .await?;
            self.handle.set_finger(i as usize, finger).await?;
        }
        Ok(())
    }

    pub fn node_ref(&self) -> &NodeRef {
        self.handle.node_ref()
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    /// Ring position of an application key.
    pub fn key_id(&self, key: &Key) -> Identifier {
        self.space.hash(&key.0)
    }

    /// Resolves the node responsible for `id`, routing from this node.
    pub async fn find_successor(&self, id: Identifier) -> Result<NodeRef, ChordError> {
        lookup::find_successor(self.transport.as_ref(), &self.handle, id, &self.config).await
    }

    /// Stores `value` under `key` at whichever node currently owns
    /// `hash(key)`. Last write wins.
    pub async fn store(&self, key: Key, value: Value) -> Result<(), ChordError> {
        let owner = self.find_successor(self.key_id(&key)).await?;
        if owner.id == self.handle.id() {
            self.handle.put_local(key, value).await
        } else {
            self.transport.store_at(&owner, key, value).await
        }
    }

    /// Reads `key` from its current owner. `Ok(None)` means the owner was
    /// reached and does not hold the key.
    pub async fn lookup(&self, key: Key) -> Result<Option<Value>, ChordError> {
        let owner = self.find_successor(self.key_id(&key)).await?;
        if owner.id == self.handle.id() {
            self.handle.get_local(key).await
        } else {
            self.transport.lookup_at(&owner, key).await
        }
    }

    /// One manual stabilization round; the maintenance workers run this on
    /// a schedule.
    pub async fn stabilize_once(&self) -> Result<(), ChordError> {
        workers::stabilize_once(&self.handle, self.transport.as_ref()).await
    }

    /// Re-resolves a single finger entry.
    pub async fn fix_finger(&self, index: usize) -> Result<(), ChordError> {
        workers::fix_finger(
            self.transport.as_ref(),
            &self.handle,
            &self.space,
            &self.config,
            index,
        )
        .await
    }

    /// Refreshes the whole finger table in one pass.
    pub async fn fix_all_fingers(&self) -> Result<(), ChordError> {
        for i in 0..self.space.bits() as usize {
            self.fix_finger(i).await?;
        }
        Ok(())
    }

    /// Spawns the periodic stabilize and fix-fingers workers. The caller
    /// owns the returned tasks and may abort them to stop maintenance.
    pub fn start_maintenance(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(workers::run_stabilize_worker(
                self.handle.clone(),
                self.transport.clone(),
                self.config.clone(),
            )),
            tokio::spawn(workers::run_fix_fingers_worker(
                self.handle.clone(),
                self.transport.clone(),
                self.space,
                self.config.clone(),
            )),
        ]
    }

    pub async fn summary(&self) -> Result<NodeSummary, ChordError> {
        self.handle.summary().await
    }
}
