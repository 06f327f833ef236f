mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_connections, TestServer, WAIT};
use horus_gun::config::HubConfig;
use horus_gun::{MemoryFlags, Outbound};
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ws_put_reaches_every_peer_once() {
    let server = TestServer::start(HubConfig::default(), Arc::new(MemoryFlags::new()))
        .await
        .unwrap();
    let mut a = server.connect("admin").await.unwrap();
    let mut b = server.connect("admin").await.unwrap();
    let mut c = server.connect("admin").await.unwrap();

    let node = json!({ "ui_texts": { "save_button": "Save" } });
    a.put(node.clone()).await.unwrap();

    let first = a.recv_timeout(WAIT).await.unwrap();
    let Outbound::Put { value, .. } = &first else {
        panic!("expected put notification, got {first:?}");
    };
    assert_eq!(value, &node);

    for peer in [&mut b, &mut c] {
        assert_eq!(peer.recv_timeout(WAIT).await.unwrap(), first);
    }
    for peer in [&mut a, &mut b, &mut c] {
        assert!(peer.recv_timeout(Duration::from_millis(200)).await.is_err());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ws_closed_peer_does_not_block_broadcast() {
    let server = TestServer::start(HubConfig::default(), Arc::new(MemoryFlags::new()))
        .await
        .unwrap();
    let hub = server.hub("admin");
    let mut a = server.connect("admin").await.unwrap();
    let b = server.connect("admin").await.unwrap();
    let mut c = server.connect("admin").await.unwrap();

    b.close().await.unwrap();
    wait_for_connections(&hub, 2).await.unwrap();

    let soul = a.put_and_confirm(json!({ "n": 1 }), WAIT).await.unwrap();
    match c.recv_timeout(WAIT).await.unwrap() {
        Outbound::Put { soul: got, .. } => assert_eq!(got, soul),
        other => panic!("expected put notification, got {other:?}"),
    }
    assert_eq!(hub.connection_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ws_shards_are_isolated() {
    let server = TestServer::start(HubConfig::default(), Arc::new(MemoryFlags::new()))
        .await
        .unwrap();
    let mut admin = server.connect("admin").await.unwrap();
    let mut platform = server.connect("platform").await.unwrap();

    let soul = admin
        .put_and_confirm(json!({ "scope": "admin" }), WAIT)
        .await
        .unwrap();

    assert!(platform
        .recv_timeout(Duration::from_millis(200))
        .await
        .is_err());
    assert_eq!(platform.fetch(soul.as_str(), WAIT).await.unwrap(), None);
}
