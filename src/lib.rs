//! # Horus Gun - append-only JSON node store with live WebSocket fan-out
//!
//! Each shard (for example `admin` and `platform`) owns one [`GraphStore`] and
//! one [`SyncHub`]. Peers connect over WebSocket and speak Gun-style frames:
//!
//! - `{"put": {...}}` stores a node under a freshly minted soul and broadcasts
//!   `{"put": {"<soul>": {...}}}` to every connected peer, the writer included.
//! - `{"get": {"#": "<soul>"}}` answers the requester alone with
//!   `{"get": {"<soul>": {...} | null}}`.
//!
//! Frames the hub cannot apply are dropped silently by default, which is what
//! Gun clients expect. Set `reject = "explicit"` to answer them with
//! `{"err": "..."}` instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use horus_gun::{config::HubConfig, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HubConfig::load(None)?;
//!     server::start(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod seed;
pub mod server;
pub mod shard;
pub mod storage;
pub mod sync;

// Re-export main types for library consumers
pub use graph::{GraphStore, Soul, Stored};
pub use shard::{Activation, Shard, ShardSet};
pub use storage::{Database, FlagStore, MemoryFlags};
pub use sync::{GunClient, Outbound, RejectPolicy, Request, SyncHub};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
