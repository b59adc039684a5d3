//! Routing and membership core of a Chord-style distributed hash table.
//!
//! Peers hash onto a circular m-bit identifier space; each node owns the
//! arc between its predecessor and itself and keeps a finger table of
//! exponentially spaced shortcuts for O(log N) lookups. A periodic
//! stabilization protocol repairs successor/predecessor pointers as nodes
//! join, so the ring converges without any central coordinator.
//!
//! Each node is an actor with a single mailbox; remote peers are reached
//! through the [`net::Transport`] trait, with an in-process loopback
//! implementation ([`net::LocalTransport`]) provided for tests and demos.
//! The physical wire, overlay security, replication and durability are
//! collaborators outside this crate.

pub mod chord;
pub mod error;
pub mod net;

pub use chord::id::{IdSpace, Identifier};
pub use chord::node::ChordNode;
pub use chord::types::{ChordConfig, Key, NodeRef, NodeSummary, Value};
pub use error::ChordError;
pub use net::{LocalTransport, Transport};
