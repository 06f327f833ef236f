//! Connection registry and frame dispatch for one shard.
//!
//! Each registered connection owns an unbounded outbound queue. The socket task
//! drains the queue; the hub only ever pushes encoded frames into it, so put, get
//! and broadcast never wait on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::frame::{self, FrameError, Outbound, Request};
use crate::graph::{kind_of, GraphStore, Soul};

pub type ConnectionId = Uuid;

/// Receiving half of a connection's outbound queue.
pub type Outgoing = mpsc::UnboundedReceiver<Arc<str>>;

/// What the hub does with frames it cannot apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectPolicy {
    /// Drop the frame and only log it. Matches what Gun clients expect.
    #[default]
    Silent,
    /// Reply to the origin with `{"err": "<reason>"}`.
    Explicit,
}

struct Connection {
    open: AtomicBool,
    tx: mpsc::UnboundedSender<Arc<str>>,
}

/// Result of applying one request from an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored { soul: Soul, delivered: usize },
    Answered { soul: Soul, found: bool },
    Rejected { kind: &'static str },
    Malformed(String),
}

pub struct SyncHub {
    shard: String,
    store: Arc<GraphStore>,
    connections: DashMap<ConnectionId, Connection>,
    policy: RejectPolicy,
}

impl SyncHub {
    pub fn new(shard: impl Into<String>, store: Arc<GraphStore>, policy: RejectPolicy) -> Self {
        Self {
            shard: shard.into(),
            store,
            connections: DashMap::new(),
            policy,
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn policy(&self) -> RejectPolicy {
        self.policy
    }

    /// Admit a connection. Frames for it arrive on the returned receiver.
    pub fn register(&self) -> (ConnectionId, Outgoing) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            Connection {
                open: AtomicBool::new(true),
                tx,
            },
        );
        info!(shard = %self.shard, connection = %id, active = self.connections.len(), "connection registered");
        (id, rx)
    }

    /// Stop delivering to a connection that is closing but not yet torn down.
    pub fn mark_closing(&self, id: ConnectionId) {
        if let Some(conn) = self.connections.get(&id) {
            conn.open.store(false, Ordering::Release);
        }
    }

    pub fn unregister(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            info!(shard = %self.shard, connection = %id, active = self.connections.len(), "connection closed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Decode one inbound text frame from `origin` and apply it.
    ///
    /// A rejected put ends the frame: a `get` carried alongside it is not answered.
    pub fn handle_text(&self, origin: ConnectionId, text: &str) -> Vec<Outcome> {
        let requests = match frame::parse(text) {
            Ok(requests) => requests,
            Err(err) => return vec![self.malformed(origin, err)],
        };

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = self.apply(origin, request);
            let stop = matches!(outcome, Outcome::Rejected { .. });
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    }

    /// Binary frames carry the same JSON as text frames and must be valid UTF-8.
    pub fn handle_bytes(&self, origin: ConnectionId, bytes: &[u8]) -> Vec<Outcome> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(origin, text),
            Err(err) => vec![self.malformed(origin, FrameError::from(err))],
        }
    }

    fn malformed(&self, origin: ConnectionId, err: FrameError) -> Outcome {
        debug!(shard = %self.shard, connection = %origin, error = %err, "dropping malformed frame");
        self.reject(origin, format!("malformed frame: {err}"));
        Outcome::Malformed(err.to_string())
    }

    fn apply(&self, origin: ConnectionId, request: Request) -> Outcome {
        match request {
            Request::Put(value) => {
                let kind = kind_of(&value);
                match self.store.put(value) {
                    Some(stored) => {
                        let soul = stored.soul.clone();
                        let delivered = self.broadcast(&Outbound::Put {
                            soul: stored.soul,
                            value: stored.value,
                        });
                        debug!(shard = %self.shard, %soul, delivered, "node stored");
                        Outcome::Stored { soul, delivered }
                    }
                    None => {
                        warn!(shard = %self.shard, connection = %origin, kind, "put rejected: not an object");
                        self.reject(origin, format!("put rejected: expected object or array, got {kind}"));
                        Outcome::Rejected { kind }
                    }
                }
            }
            Request::Get(soul) => {
                let value = self.store.get(soul.as_str());
                let found = value.is_some();
                self.send_to(
                    origin,
                    &Outbound::Get {
                        soul: soul.clone(),
                        value,
                    },
                );
                Outcome::Answered { soul, found }
            }
        }
    }

    fn reject(&self, origin: ConnectionId, message: String) {
        if self.policy == RejectPolicy::Explicit {
            self.send_to(origin, &Outbound::Err { message });
        }
    }

    /// Deliver a frame to every open connection, origin included.
    ///
    /// Connections whose queue is gone are removed; the rest still receive the
    /// frame. Returns how many connections it was delivered to.
    pub fn broadcast(&self, frame: &Outbound) -> usize {
        let text: Arc<str> = Arc::from(frame.encode());
        let mut delivered = 0;
        let mut failed = Vec::new();

        for entry in self.connections.iter() {
            let conn = entry.value();
            if !conn.open.load(Ordering::Acquire) {
                continue;
            }
            match conn.tx.send(Arc::clone(&text)) {
                Ok(()) => delivered += 1,
                Err(_) => failed.push(*entry.key()),
            }
        }

        // Removal has to wait until the iterator releases its shard locks
        for id in failed {
            warn!(shard = %self.shard, connection = %id, "delivery failed, dropping connection");
            self.connections.remove(&id);
        }

        delivered
    }

    /// Deliver a frame to one connection. Returns whether it was queued.
    pub fn send_to(&self, id: ConnectionId, frame: &Outbound) -> bool {
        let sent = match self.connections.get(&id) {
            Some(conn) if conn.open.load(Ordering::Acquire) => {
                conn.tx.send(Arc::from(frame.encode())).is_ok()
            }
            _ => return false,
        };
        if !sent {
            warn!(shard = %self.shard, connection = %id, "delivery failed, dropping connection");
            self.connections.remove(&id);
        }
        sent
    }
}
