mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{TestServer, WAIT};
use horus_gun::config::{HubConfig, ShardConfig};
use horus_gun::storage::INITIALIZED;
use horus_gun::{Database, FlagStore};
use serde_json::json;
use tempfile::TempDir;

fn config(data_dir: &std::path::Path, seed_file: std::path::PathBuf) -> HubConfig {
    HubConfig {
        data_dir: data_dir.to_path_buf(),
        default_shard: "admin".into(),
        shards: vec![
            ShardConfig {
                name: "admin".into(),
                seed_file: Some(seed_file),
            },
            ShardConfig::named("platform"),
        ],
        ..HubConfig::default()
    }
}

fn open_db(config: &HubConfig) -> Result<Arc<Database>> {
    let db = Database::new(&config.data_dir)?;
    db.initialize()?;
    Ok(Arc::new(db))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn seed_serve_restart_workflow() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let seed_file = temp_dir.path().join("admin-seed.json");
    std::fs::write(&seed_file, r#"[{"ui_texts":{"login_button":"Login"},"version":"1.0.0"}]"#)?;
    let config = config(&temp_dir.path().join("data"), seed_file);

    // First boot seeds both shards and persists the flags
    let db = open_db(&config)?;
    let server = TestServer::start(config.clone(), db.clone()).await?;
    let admin_store = Arc::clone(server.state.shards.get("admin").unwrap().store());
    assert_eq!(admin_store.len(), 1);
    assert!(db.get_flag("admin", INITIALIZED)?);
    assert!(db.get_flag("platform", INITIALIZED)?);

    let seed_soul = admin_store.souls().remove(0);
    let mut client = server.connect("admin").await?;
    let seeded = client.fetch(seed_soul.as_str(), WAIT).await?;
    assert_eq!(seeded.unwrap()["ui_texts"]["login_button"], json!("Login"));
    client.close().await?;
    drop(server);
    drop(db);

    // Second boot sees the flags and does not reseed
    let db = open_db(&config)?;
    let server = TestServer::start(config, db).await?;
    for shard in server.state.shards.iter() {
        assert!(shard.store().is_empty(), "shard {} was reseeded", shard.name());
        assert!(shard.stats().await.initialized);
    }

    Ok(())
}
