use thiserror::Error;

/// Errors surfaced by the routing and membership core.
///
/// A missing key is not an error: local and routed lookups report absence
/// as `Ok(None)`, which keeps "not stored" observably distinct from "the
/// owner could not be reached".
#[derive(Error, Debug)]
pub enum ChordError {
    /// A peer did not answer within the transport deadline, or is not
    /// reachable at all.
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    /// Routing could not resolve an owner: the hop budget ran out or an
    /// unreachable hop had no alternate route.
    #[error("lookup failed: {0}")]
    LookupFailed(String),

    /// An identifier did not fit the configured ring width.
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("failed to join ring: {0}")]
    JoinFailed(String),

    /// The node's actor task has shut down and can serve no further calls.
    #[error("node actor stopped")]
    ActorStopped,
}
