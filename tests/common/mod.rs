#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use horus_gun::config::HubConfig;
use horus_gun::server::{self, AppState};
use horus_gun::{FlagStore, GunClient, SyncHub};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub const WAIT: Duration = Duration::from_secs(3);

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: HubConfig, flags: Arc<dyn FlagStore>) -> Result<Self> {
        let state = server::prepare(&config, flags).await?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn({
            let state = state.clone();
            async move {
                let _ = server::serve_listener(listener, state).await;
            }
        });

        Ok(Self { addr, state, handle })
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn hub(&self, shard: &str) -> Arc<SyncHub> {
        Arc::clone(self.state.shards.get(shard).expect("shard configured").hub())
    }

    /// Connect to a shard and wait until the hub has registered the connection.
    pub async fn connect(&self, shard: &str) -> Result<GunClient> {
        let hub = self.hub(shard);
        let before = hub.connection_count();
        let client = GunClient::connect(&self.url(&format!("/gun/{shard}"))).await?;
        wait_for_connections(&hub, before + 1).await?;
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn wait_for_connections(hub: &SyncHub, expected: usize) -> Result<()> {
    let deadline = Instant::now() + WAIT;
    while hub.connection_count() != expected {
        if Instant::now() > deadline {
            bail!(
                "expected {expected} connections, hub has {}",
                hub.connection_count()
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
