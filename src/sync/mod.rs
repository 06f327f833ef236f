pub mod client;
pub mod frame;
pub mod hub;

pub use client::GunClient;
pub use frame::{FrameError, Outbound, Request};
pub use hub::{ConnectionId, Outcome, Outgoing, RejectPolicy, SyncHub};

// Live sync for one shard: frames come in over a connection, the hub applies
// them to the shard's GraphStore and fans mutations out to every peer.
