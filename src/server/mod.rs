pub mod api;

use anyhow::Result;

use crate::config::HubConfig;

pub use api::{prepare, router, serve_listener, AppState};

pub async fn start(config: HubConfig) -> Result<()> {
    api::serve(config).await
}
