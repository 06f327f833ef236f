//! Wire frames exchanged over a hub connection.
//!
//! Inbound:  `{"put": <object>}` and `{"get": {"#": "<soul>"}}`
//! Outbound: `{"put": {"<soul>": <object>}}`, `{"get": {"<soul>": <object|null>}}`
//! and, under the explicit reject policy, `{"err": "<reason>"}`.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::graph::Soul;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary frame is not utf-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("frame is not a json object")]
    NotAnObject,

    #[error("frame has neither put nor get")]
    UnknownShape,

    #[error("get frame is missing a '#' soul")]
    MissingSoul,

    #[error("reply frame is empty")]
    EmptyReply,
}

/// One operation requested by an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Put(Value),
    Get(Soul),
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Request::Put(value) => json!({ "put": value }).to_string(),
            Request::Get(soul) => json!({ "get": { "#": soul } }).to_string(),
        }
    }
}

/// Decode an inbound frame.
///
/// A frame may carry both `put` and `get`; the put comes first. Keys whose value
/// is falsy (null, false, 0, "") are treated as absent. A malformed `get`
/// invalidates the whole frame, so nothing from it is applied.
pub fn parse(text: &str) -> Result<Vec<Request>, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(frame) = value else {
        return Err(FrameError::NotAnObject);
    };

    let mut requests = Vec::with_capacity(2);

    if let Some(put) = frame.get("put").filter(|v| is_truthy(v)) {
        requests.push(Request::Put(put.clone()));
    }

    if let Some(get) = frame.get("get").filter(|v| is_truthy(v)) {
        let soul = get
            .get("#")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingSoul)?;
        requests.push(Request::Get(Soul::from(soul)));
    }

    if requests.is_empty() {
        return Err(FrameError::UnknownShape);
    }
    Ok(requests)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A frame sent from the hub to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Mutation notification, broadcast to every open connection.
    Put { soul: Soul, value: Value },
    /// Read reply, sent to the requester only.
    Get { soul: Soul, value: Option<Value> },
    /// Rejection notice, sent to the origin only.
    Err { message: String },
}

impl Outbound {
    pub fn to_value(&self) -> Value {
        match self {
            Outbound::Put { soul, value } => {
                let mut node = Map::new();
                node.insert(soul.to_string(), value.clone());
                json!({ "put": node })
            }
            Outbound::Get { soul, value } => {
                let mut node = Map::new();
                node.insert(soul.to_string(), value.clone().unwrap_or(Value::Null));
                json!({ "get": node })
            }
            Outbound::Err { message } => json!({ "err": message }),
        }
    }

    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    /// Decode a frame produced by [`Outbound::encode`].
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut frame) = value else {
            return Err(FrameError::NotAnObject);
        };

        if let Some(Value::String(message)) = frame.remove("err") {
            return Ok(Outbound::Err { message });
        }
        if let Some(Value::Object(node)) = frame.remove("put") {
            let (soul, value) = node.into_iter().next().ok_or(FrameError::EmptyReply)?;
            return Ok(Outbound::Put {
                soul: Soul::from(soul),
                value,
            });
        }
        if let Some(Value::Object(node)) = frame.remove("get") {
            let (soul, value) = node.into_iter().next().ok_or(FrameError::EmptyReply)?;
            let value = (!value.is_null()).then_some(value);
            return Ok(Outbound::Get {
                soul: Soul::from(soul),
                value,
            });
        }
        Err(FrameError::UnknownShape)
    }
}
