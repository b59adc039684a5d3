pub mod actor;
pub mod id;
pub mod lookup;
pub mod node;
pub mod types;
pub mod workers;

// Protocol configuration defaults.
pub const DEFAULT_ID_BITS: u32 = 160;
pub const STABILIZE_INTERVAL_SECS: u64 = 30;
pub const FIX_FINGERS_INTERVAL_SECS: u64 = 60;
pub const RPC_TIMEOUT_SECS: u64 = 5;
pub const MAX_LOOKUP_HOPS: usize = 64;
