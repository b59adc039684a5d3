use crate::chord::id::{IdSpace, Identifier};
use crate::chord::{
    DEFAULT_ID_BITS, FIX_FINGERS_INTERVAL_SECS, MAX_LOOKUP_HOPS, RPC_TIMEOUT_SECS,
    STABILIZE_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A lightweight identity + address handle for a peer. Carried in routing
/// tables and RPC payloads; never implies ownership of the peer's state.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: Identifier,
    pub addr: String,
}

impl NodeRef {
    pub fn new(id: Identifier, addr: impl Into<String>) -> Self {
        NodeRef { id, addr: addr.into() }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({} @ {})", self.id, self.addr)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// Key type for storing data in the DHT. Keys are kept verbatim; only
/// their hash determines placement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(pub Vec<u8>);

/// Value type for storing data in the DHT. Opaque to the protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value(pub Vec<u8>);

/// Tunables for one node. `id_bits` must match across the whole ring.
#[derive(Clone, Debug)]
pub struct ChordConfig {
    /// Identifier-space width m, in bits.
    pub id_bits: u32,
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    /// Deadline applied to every remote call.
    pub rpc_timeout: Duration,
    /// Upper bound on routing hops before a lookup is abandoned.
    pub max_lookup_hops: usize,
}

impl Default for ChordConfig {
    fn default() -> Self {
        ChordConfig {
            id_bits: DEFAULT_ID_BITS,
            stabilize_interval: Duration::from_secs(STABILIZE_INTERVAL_SECS),
            fix_fingers_interval: Duration::from_secs(FIX_FINGERS_INTERVAL_SECS),
            rpc_timeout: Duration::from_secs(RPC_TIMEOUT_SECS),
            max_lookup_hops: MAX_LOOKUP_HOPS,
        }
    }
}

/// Snapshot of a node's ring pointers, for diagnostics and the CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub address: String,
    pub successor: String,
    pub predecessor: Option<String>,
}

/// Per-node routing table: entry `i` points at the successor of
/// `(self.id + 2^i) mod 2^m`. Entries may be empty while the node
/// bootstraps; entry 0 mirrors the node's successor.
#[derive(Clone, Debug)]
pub struct FingerTable {
    entries: Vec<Option<NodeRef>>,
}

impl FingerTable {
    pub fn new(bits: u32) -> Self {
        FingerTable { entries: vec![None; bits as usize] }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NodeRef> {
        self.entries.get(index).and_then(|e| e.as_ref())
    }

    /// Out-of-range indices are ignored.
    pub fn update(&mut self, index: usize, node: NodeRef) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = Some(node);
        }
    }

    /// Greedy highest-stride-first scan: the first finger strictly inside
    /// the arc `(local, target)` is the best next hop we know. Empty and
    /// self-referencing fingers are skipped, as is `skip` (a peer the
    /// caller just found unreachable). `None` means the caller should fall
    /// back to the plain successor.
    pub fn closest_preceding_node(
        &self,
        space: &IdSpace,
        local: Identifier,
        target: Identifier,
        skip: Option<Identifier>,
    ) -> Option<NodeRef> {
        for finger in self.entries.iter().rev().flatten() {
            if finger.id == local || Some(finger.id) == skip {
                continue;
            }
            if space.between(local, finger.id, target, false, false) {
                return Some(finger.clone());
            }
        }
        None
    }
}
