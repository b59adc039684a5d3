pub mod local;

use crate::chord::id::Identifier;
use crate::chord::lookup::LookupStep;
use crate::chord::types::{Key, NodeRef, Value};
use crate::error::ChordError;
use async_trait::async_trait;

pub use local::LocalTransport;

/// The per-node RPC surface, transport-agnostic.
///
/// Every call is an asynchronous request/response exchange against the
/// target peer; the wire carrying it (gRPC, plain TCP, an in-process
/// registry) is a collaborator behind this trait. Implementations must
/// bound each call with a deadline and report a peer that cannot answer as
/// [`ChordError::NodeUnreachable`] rather than hanging.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One routing step: asks `target` whether it owns `id` or which peer
    /// to try next. `skip` excludes a peer the caller found unreachable,
    /// so the target can offer an alternate finger.
    async fn find_successor(
        &self,
        target: &NodeRef,
        id: Identifier,
        skip: Option<Identifier>,
    ) -> Result<LookupStep, ChordError>;

    /// Snapshot read of the target's predecessor pointer.
    async fn get_predecessor(&self, target: &NodeRef) -> Result<Option<NodeRef>, ChordError>;

    /// Proposes `candidate` as the target's predecessor. Idempotent.
    async fn notify(&self, target: &NodeRef, candidate: NodeRef) -> Result<(), ChordError>;

    /// Writes into the target's local store. Overwrite semantics.
    async fn store_at(&self, target: &NodeRef, key: Key, value: Value) -> Result<(), ChordError>;

    /// Reads from the target's local store; `Ok(None)` when the key is
    /// absent there.
    async fn lookup_at(&self, target: &NodeRef, key: Key) -> Result<Option<Value>, ChordError>;
}
