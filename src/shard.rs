//! One independent store + hub pair per tenant surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{with_retry, RetryPolicy};
use crate::graph::GraphStore;
use crate::seed::SeedSet;
use crate::storage::{self, FlagStore, INITIALIZED};
use crate::sync::{RejectPolicy, SyncHub};

/// Where activation got to within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedState {
    Pending,
    /// Seeds are in the store but the flag write has not succeeded yet.
    Written,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Seeded(usize),
    AlreadyInitialized,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShardStats {
    pub name: String,
    pub nodes: usize,
    pub connections: usize,
    pub initialized: bool,
    pub started_at: DateTime<Utc>,
}

pub struct Shard {
    name: String,
    hub: Arc<SyncHub>,
    flags: Arc<dyn FlagStore>,
    seeds: SeedSet,
    retry: RetryPolicy,
    state: Mutex<SeedState>,
    started_at: DateTime<Utc>,
}

impl Shard {
    pub fn new(
        name: impl Into<String>,
        flags: Arc<dyn FlagStore>,
        seeds: SeedSet,
        policy: RejectPolicy,
        retry: RetryPolicy,
    ) -> Self {
        let name = name.into();
        let store = Arc::new(GraphStore::new());
        Self {
            hub: Arc::new(SyncHub::new(name.clone(), store, policy)),
            name,
            flags,
            seeds,
            retry,
            state: Mutex::new(SeedState::Pending),
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hub(&self) -> &Arc<SyncHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        self.hub.store()
    }

    /// Write the seed nodes unless the persisted flag says they already were.
    ///
    /// Safe to call repeatedly and concurrently: callers queue on the shard's
    /// activation lock, and seeds are put at most once per process even when the
    /// flag write has to be retried by a later call.
    pub async fn activate(&self) -> Result<Activation> {
        let mut state = self.state.lock().await;

        if *state == SeedState::Pending {
            let initialized = with_retry(&self.retry, "reading initialized flag", || {
                storage::get_flag(Arc::clone(&self.flags), &self.name, INITIALIZED)
            })
            .await?;

            if initialized {
                *state = SeedState::Done;
                info!(shard = %self.name, "already initialized, skipping seed data");
                return Ok(Activation::AlreadyInitialized);
            }

            for node in self.seeds.nodes() {
                if self.store().put(node.clone()).is_none() {
                    bail!("seed node for shard {} is not an object", self.name);
                }
            }
            *state = SeedState::Written;
        }

        if *state == SeedState::Done {
            return Ok(Activation::AlreadyInitialized);
        }

        with_retry(&self.retry, "writing initialized flag", || {
            storage::set_flag(Arc::clone(&self.flags), &self.name, INITIALIZED, true)
        })
        .await?;
        *state = SeedState::Done;

        info!(shard = %self.name, seeds = self.seeds.len(), "seed data loaded");
        Ok(Activation::Seeded(self.seeds.len()))
    }

    pub async fn stats(&self) -> ShardStats {
        let initialized = *self.state.lock().await == SeedState::Done;
        ShardStats {
            name: self.name.clone(),
            nodes: self.store().len(),
            connections: self.hub.connection_count(),
            initialized,
            started_at: self.started_at,
        }
    }
}

/// Every shard served by one process, addressed by name.
pub struct ShardSet {
    shards: BTreeMap<String, Arc<Shard>>,
    default: String,
}

impl ShardSet {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            shards: BTreeMap::new(),
            default: default.into(),
        }
    }

    pub fn insert(&mut self, shard: Shard) {
        self.shards.insert(shard.name.clone(), Arc::new(shard));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Shard>> {
        self.shards.get(name)
    }

    pub fn default_shard(&self) -> Option<&Arc<Shard>> {
        self.shards.get(&self.default)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Shard>> {
        self.shards.values()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub async fn activate_all(&self) -> Result<()> {
        for shard in self.shards.values() {
            shard.activate().await?;
        }
        Ok(())
    }
}
