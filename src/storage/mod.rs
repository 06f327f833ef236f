pub mod db;
pub mod memory;

use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use db::{Database, DB_FILE};
pub use memory::MemoryFlags;

/// Name of the flag recording that a shard's seed nodes were written.
pub const INITIALIZED: &str = "initialized";

/// Durable boolean flags, keyed by shard and name.
///
/// Implementations block; async callers go through [`get_flag`] and [`set_flag`].
pub trait FlagStore: Send + Sync {
    fn get_flag(&self, shard: &str, name: &str) -> Result<bool>;
    fn set_flag(&self, shard: &str, name: &str, value: bool) -> Result<()>;
}

pub async fn get_flag(store: Arc<dyn FlagStore>, shard: &str, name: &str) -> Result<bool> {
    let (shard, name) = (shard.to_string(), name.to_string());
    tokio::task::spawn_blocking(move || store.get_flag(&shard, &name))
        .await
        .map_err(|err| anyhow!("failed to join storage task: {err}"))?
}

pub async fn set_flag(store: Arc<dyn FlagStore>, shard: &str, name: &str, value: bool) -> Result<()> {
    let (shard, name) = (shard.to_string(), name.to_string());
    tokio::task::spawn_blocking(move || store.set_flag(&shard, &name, value))
        .await
        .map_err(|err| anyhow!("failed to join storage task: {err}"))?
}
