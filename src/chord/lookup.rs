use crate::chord::actor::NodeHandle;
use crate::chord::id::Identifier;
use crate::chord::types::{ChordConfig, NodeRef};
use crate::error::ChordError;
use crate::net::Transport;
use tracing::{trace, warn};

/// One step of the iterative lookup chain. The recursive delegation of the
/// textbook algorithm is flattened into request/response hops: a node
/// either owns the identifier or names the best next hop it knows, and the
/// driver below walks the chain under a hop budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupStep {
    /// The answering node is responsible for the identifier (or resolved
    /// the next hop to itself, the single-node termination guard).
    Done(NodeRef),
    Forward(NodeRef),
}

/// Resolves the successor of `id` starting from the local node.
pub async fn find_successor(
    transport: &dyn Transport,
    origin: &NodeHandle,
    id: Identifier,
    config: &ChordConfig,
) -> Result<NodeRef, ChordError> {
    let first = origin.next_hop(id, None).await?;
    drive(transport, origin, None, first, id, config).await
}

/// Resolves the successor of `id` through a remote entry point; used while
/// joining, before the local node is part of the ring.
pub async fn find_successor_from(
    transport: &dyn Transport,
    origin: &NodeHandle,
    entry: &NodeRef,
    id: Identifier,
    config: &ChordConfig,
) -> Result<NodeRef, ChordError> {
    let first = transport.find_successor(entry, id, None).await?;
    drive(transport, origin, Some(entry.clone()), first, id, config).await
}

/// Walks the hop chain until a node claims responsibility.
///
/// `cursor` is the node that produced `step` (None when it came from the
/// local actor). An unreachable hop gets one bounded retry: the node that
/// pointed at it is asked again with that peer excluded, and if the
/// alternate route leads straight back, the lookup fails rather than
/// guessing an owner.
async fn drive(
    transport: &dyn Transport,
    origin: &NodeHandle,
    mut cursor: Option<NodeRef>,
    mut step: LookupStep,
    id: Identifier,
    config: &ChordConfig,
) -> Result<NodeRef, ChordError> {
    let mut hops = 0usize;
    loop {
        let next = match step {
            LookupStep::Done(node) => {
                trace!(%id, owner = %node, hops, "lookup resolved");
                return Ok(node);
            }
            LookupStep::Forward(next) => next,
        };
        hops += 1;
        if hops > config.max_lookup_hops {
            return Err(ChordError::LookupFailed(format!(
                "no owner for {} within {} hops",
                id, config.max_lookup_hops
            )));
        }
        trace!(%id, hop = %next, hops, "forwarding lookup");
        step = match transport.find_successor(&next, id, None).await {
            Ok(step) => {
                cursor = Some(next);
                step
            }
            Err(ChordError::NodeUnreachable(peer)) => {
                warn!(%id, peer = %peer, "hop unreachable, retrying via alternate finger");
                let alternate = match &cursor {
                    Some(prev) => transport.find_successor(prev, id, Some(next.id)).await?,
                    None => origin.next_hop(id, Some(next.id)).await?,
                };
                match alternate {
                    LookupStep::Forward(n) if n.id == next.id => {
                        return Err(ChordError::LookupFailed(format!(
                            "peer {} unreachable and no alternate route to {}",
                            next.addr, id
                        )));
                    }
                    other => other,
                }
            }
            Err(e) => return Err(e),
        };
    }
}
