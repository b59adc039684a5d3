use crate::chord::actor::NodeHandle;
use crate::chord::id::IdSpace;
use crate::chord::lookup;
use crate::chord::types::ChordConfig;
use crate::error::ChordError;
use crate::net::Transport;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One stabilization round against the node's current successor.
///
/// Fetches the successor's predecessor snapshot, lets the actor decide
/// whether to adopt it (the betweenness check runs inside the actor
/// against current state, not the snapshot we read the successor from),
/// then notifies whichever successor came out of the check. Calls to self
/// short-circuit the transport: a bootstrap node's successor is itself.
pub async fn stabilize_once(
    handle: &NodeHandle,
    transport: &dyn Transport,
) -> Result<(), ChordError> {
    let local = handle.node_ref().clone();
    let successor = handle.get_successor().await?;

    let snapshot = if successor.id == local.id {
        handle.get_predecessor().await?
    } else {
        transport.get_predecessor(&successor).await?
    };

    let current = match snapshot {
        Some(candidate) => handle.adopt_successor(candidate).await?,
        None => successor,
    };

    if current.id == local.id {
        handle.notify(local).await
    } else {
        transport.notify(&current, local).await
    }
}

/// Re-resolves finger `index` and installs the result. The same procedure
/// that built the table at join, applied one entry at a time.
pub async fn fix_finger(
    transport: &dyn Transport,
    handle: &NodeHandle,
    space: &IdSpace,
    config: &ChordConfig,
    index: usize,
) -> Result<(), ChordError> {
    let target = space.add_pow2(handle.id(), index as u32);
    let owner = lookup::find_successor(transport, handle, target, config).await?;
    handle.set_finger(index, owner).await
}

/// Periodic stabilization loop. A failed round is logged and retried on
/// the next tick; the protocol self-heals, it does not escalate.
pub async fn run_stabilize_worker(
    handle: NodeHandle,
    transport: Arc<dyn Transport>,
    config: ChordConfig,
) {
    info!(node = %handle.node_ref(), "starting stabilize worker");
    let mut tick = tokio::time::interval(config.stabilize_interval);
    loop {
        tick.tick().await;
        if let Err(e) = stabilize_once(&handle, transport.as_ref()).await {
            warn!(node = %handle.node_ref(), error = %e, "stabilize round failed, retrying next tick");
        }
    }
}

/// Periodic finger refresh, one entry per tick, round-robin.
pub async fn run_fix_fingers_worker(
    handle: NodeHandle,
    transport: Arc<dyn Transport>,
    space: IdSpace,
    config: ChordConfig,
) {
    info!(node = %handle.node_ref(), "starting fix-fingers worker");
    let mut tick = tokio::time::interval(config.fix_fingers_interval);
    let mut next = 0usize;
    loop {
        tick.tick().await;
        if let Err(e) = fix_finger(transport.as_ref(), &handle, &space, &config, next).await {
            debug!(node = %handle.node_ref(), finger = next, error = %e, "finger refresh failed");
        }
        next = (next + 1) % space.bits() as usize;
    }
}
