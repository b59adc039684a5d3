use crate::chord::id::{IdSpace, Identifier};
use crate::chord::lookup::LookupStep;
use crate::chord::types::{FingerTable, Key, NodeRef, NodeSummary, Value};
use crate::error::ChordError;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const MAILBOX_CAPACITY: usize = 32;

/// Actor messages.
///
/// Every handler is purely local and returns immediately: nothing here
/// awaits a remote call while the mailbox is blocked, so a single actor
/// per node gives the single-writer guarantee over `successor`,
/// `predecessor` and the finger table without any cross-actor deadlock.
#[derive(Debug)]
pub enum NodeMessage {
    /// One step of the iterative lookup chain: either this node owns `id`,
    /// or it names the best next hop it knows. `skip` excludes a peer the
    /// caller just found unreachable.
    NextHop {
        id: Identifier,
        skip: Option<Identifier>,
        respond_to: oneshot::Sender<LookupStep>,
    },
    GetSuccessor {
        respond_to: oneshot::Sender<NodeRef>,
    },
    /// Snapshot read; may race benignly with this node's own mutation.
    GetPredecessor {
        respond_to: oneshot::Sender<Option<NodeRef>>,
    },
    /// Fire-and-forget predecessor candidate, idempotent.
    Notify { candidate: NodeRef },
    /// Stabilization check: adopt `candidate` (our successor's predecessor)
    /// as the new successor if it sits between us and the current
    /// successor. Replies with the successor after the check, so the
    /// caller always notifies the right peer.
    AdoptSuccessor {
        candidate: NodeRef,
        respond_to: oneshot::Sender<NodeRef>,
    },
    /// Join-time successor install.
    SetSuccessor {
        node: NodeRef,
        respond_to: oneshot::Sender<()>,
    },
    SetFinger { index: usize, node: NodeRef },
    GetFinger {
        index: usize,
        respond_to: oneshot::Sender<Option<NodeRef>>,
    },
    PutLocal {
        key: Key,
        value: Value,
        respond_to: oneshot::Sender<()>,
    },
    GetLocal {
        key: Key,
        respond_to: oneshot::Sender<Option<Value>>,
    },
    Summary {
        respond_to: oneshot::Sender<NodeSummary>,
    },
}

/// The actor owning one node's ring state and local store.
pub struct NodeActor {
    space: IdSpace,
    local: NodeRef,
    successor: NodeRef,
    predecessor: Option<NodeRef>,
    fingers: FingerTable,
    storage: HashMap<Key, Value>,
    receiver: mpsc::Receiver<NodeMessage>,
}

impl NodeActor {
    pub fn new(space: IdSpace, local: NodeRef, receiver: mpsc::Receiver<NodeMessage>) -> Self {
        let successor = local.clone();
        NodeActor {
            fingers: FingerTable::new(space.bits()),
            space,
            local,
            successor,
            predecessor: None,
            storage: HashMap::new(),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }
        debug!(node = %self.local, "actor mailbox closed, shutting down");
    }

    fn handle_message(&mut self, msg: NodeMessage) {
        match msg {
            NodeMessage::NextHop { id, skip, respond_to } => {
                let _ = respond_to.send(self.next_hop(id, skip));
            }
            NodeMessage::GetSuccessor { respond_to } => {
                let _ = respond_to.send(self.successor.clone());
            }
            NodeMessage::GetPredecessor { respond_to } => {
                let _ = respond_to.send(self.predecessor.clone());
            }
            NodeMessage::Notify { candidate } => {
                self.notify(candidate);
            }
            NodeMessage::AdoptSuccessor { candidate, respond_to } => {
                self.adopt_successor(candidate);
                let _ = respond_to.send(self.successor.clone());
            }
            NodeMessage::SetSuccessor { node, respond_to } => {
                debug!(node = %self.local, successor = %node, "installing successor");
                self.fingers.update(0, node.clone());
                self.successor = node;
                let _ = respond_to.send(());
            }
            NodeMessage::SetFinger { index, node } => {
                if index == 0 {
                    self.successor = node.clone();
                }
                self.fingers.update(index, node);
            }
            NodeMessage::GetFinger { index, respond_to } => {
                let _ = respond_to.send(self.fingers.get(index).cloned());
            }
            NodeMessage::PutLocal { key, value, respond_to } => {
                // Overwrite semantics: last write wins.
                self.storage.insert(key, value);
                let _ = respond_to.send(());
            }
            NodeMessage::GetLocal { key, respond_to } => {
                let _ = respond_to.send(self.storage.get(&key).cloned());
            }
            NodeMessage::Summary { respond_to } => {
                let _ = respond_to.send(NodeSummary {
                    id: self.local.id.to_string(),
                    address: self.local.addr.clone(),
                    successor: self.successor.id.to_string(),
                    predecessor: self.predecessor.as_ref().map(|p| p.id.to_string()),
                });
            }
        }
    }

    /// Is this node the owner of `id`?
    ///
    /// With a predecessor: `id` must fall in the half-open arc
    /// `(predecessor, self]`. Without one (bootstrap / single-node ring)
    /// the rule is the plain-ordering pair `id <= self || id > successor`;
    /// it is not a degenerate case of the arc test and stays separate.
    fn is_responsible(&self, id: Identifier) -> bool {
        match &self.predecessor {
            Some(pred) => self.space.between(pred.id, id, self.local.id, false, true),
            None => id <= self.local.id || id > self.successor.id,
        }
    }

    fn next_hop(&self, id: Identifier, skip: Option<Identifier>) -> LookupStep {
        if self.is_responsible(id) {
            return LookupStep::Done(self.local.clone());
        }
        let next = self
            .fingers
            .closest_preceding_node(&self.space, self.local.id, id, skip)
            .unwrap_or_else(|| self.successor.clone());
        if next.id == self.local.id {
            // Degenerate or not-yet-stabilized ring: delegating to
            // ourselves would recurse forever, so answer with self.
            LookupStep::Done(self.local.clone())
        } else {
            LookupStep::Forward(next)
        }
    }

    fn notify(&mut self, candidate: NodeRef) {
        let adopt = match &self.predecessor {
            None => true,
            Some(pred) => self
                .space
                .between(pred.id, candidate.id, self.local.id, false, false),
        };
        if adopt {
            debug!(node = %self.local, predecessor = %candidate, "adopting predecessor");
            self.predecessor = Some(candidate);
        }
    }

    fn adopt_successor(&mut self, candidate: NodeRef) {
        if self
            .space
            .between(self.local.id, candidate.id, self.successor.id, false, false)
        {
            debug!(node = %self.local, successor = %candidate, "adopting successor");
            self.fingers.update(0, candidate.clone());
            self.successor = candidate;
        }
    }
}

/// Clonable handle over a node's mailbox. The gRPC-shaped surface of the
/// node: every method is an asynchronous request/response exchange against
/// the actor.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    local: NodeRef,
    sender: mpsc::Sender<NodeMessage>,
}

impl NodeHandle {
    /// Spawns the actor for `local` and returns its handle together with
    /// the task running the mailbox loop.
    pub fn spawn(space: IdSpace, local: NodeRef) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = NodeActor::new(space, local.clone(), receiver);
        let task = tokio::spawn(actor.run());
        (NodeHandle { local, sender }, task)
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.local
    }

    pub fn id(&self) -> Identifier {
        self.local.id
    }

    async fn request<T>(
        &self,
        msg: NodeMessage,
        recv: oneshot::Receiver<T>,
    ) -> Result<T, ChordError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| ChordError::ActorStopped)?;
        recv.await.map_err(|_| ChordError::ActorStopped)
    }

    pub async fn next_hop(
        &self,
        id: Identifier,
        skip: Option<Identifier>,
    ) -> Result<LookupStep, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::NextHop { id, skip, respond_to: send }, recv)
            .await
    }

    pub async fn get_successor(&self) -> Result<NodeRef, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::GetSuccessor { respond_to: send }, recv)
            .await
    }

    pub async fn get_predecessor(&self) -> Result<Option<NodeRef>, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::GetPredecessor { respond_to: send }, recv)
            .await
    }

    pub async fn notify(&self, candidate: NodeRef) -> Result<(), ChordError> {
        self.sender
            .send(NodeMessage::Notify { candidate })
            .await
            .map_err(|_| ChordError::ActorStopped)
    }

    pub async fn adopt_successor(&self, candidate: NodeRef) -> Result<NodeRef, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(
            NodeMessage::AdoptSuccessor { candidate, respond_to: send },
            recv,
        )
        .await
    }

    pub async fn set_successor(&self, node: NodeRef) -> Result<(), ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::SetSuccessor { node, respond_to: send }, recv)
            .await
    }

    pub async fn set_finger(&self, index: usize, node: NodeRef) -> Result<(), ChordError> {
        self.sender
            .send(NodeMessage::SetFinger { index, node })
            .await
            .map_err(|_| ChordError::ActorStopped)
    }

    pub async fn get_finger(&self, index: usize) -> Result<Option<NodeRef>, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::GetFinger { index, respond_to: send }, recv)
            .await
    }

    pub async fn put_local(&self, key: Key, value: Value) -> Result<(), ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::PutLocal { key, value, respond_to: send }, recv)
            .await
    }

    pub async fn get_local(&self, key: Key) -> Result<Option<Value>, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::GetLocal { key, respond_to: send }, recv)
            .await
    }

    pub async fn summary(&self) -> Result<NodeSummary, ChordError> {
        let (send, recv) = oneshot::channel();
        self.request(NodeMessage::Summary { respond_to: send }, recv)
            .await
    }
}
