use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::frame::{Outbound, Request};
use crate::graph::Soul;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Minimal peer speaking the hub's wire frames over one WebSocket.
pub struct GunClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl GunClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| anyhow!("invalid ws url: {e}"))?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to {url}"))?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        self.send_raw(request.encode()).await
    }

    /// Send an arbitrary text frame, valid or not.
    pub async fn send_raw(&mut self, text: impl Into<String>) -> Result<()> {
        self.write
            .send(Message::Text(text.into().into()))
            .await
            .context("sending frame")
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.write
            .send(Message::Binary(bytes.into()))
            .await
            .context("sending frame")
    }

    pub async fn put(&mut self, value: Value) -> Result<()> {
        self.send(&Request::Put(value)).await
    }

    pub async fn get(&mut self, soul: impl Into<Soul>) -> Result<()> {
        self.send(&Request::Get(soul.into())).await
    }

    /// Next hub frame, or `None` once the server closes the connection.
    pub async fn next_frame(&mut self) -> Result<Option<Outbound>> {
        while let Some(msg) = self.read.next().await {
            match msg.context("reading frame")? {
                Message::Text(text) => return Ok(Some(Outbound::decode(text.as_str())?)),
                Message::Binary(bin) => {
                    let text = std::str::from_utf8(&bin).context("binary frame is not utf-8")?;
                    return Ok(Some(Outbound::decode(text)?));
                }
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Outbound> {
        match tokio::time::timeout(timeout, self.next_frame()).await {
            Ok(Ok(Some(frame))) => Ok(frame),
            Ok(Ok(None)) => bail!("connection closed"),
            Ok(Err(err)) => Err(err),
            Err(_) => bail!("no frame within {timeout:?}"),
        }
    }

    /// Write a node and wait for its broadcast to come back. Returns the new soul.
    ///
    /// The broadcast is recognised by its value. If another peer stores an equal
    /// value at the same moment, the soul returned may be theirs; both souls hold
    /// the same node.
    pub async fn put_and_confirm(&mut self, value: Value, timeout: Duration) -> Result<Soul> {
        self.put(value.clone()).await?;
        loop {
            match self.recv_timeout(timeout).await? {
                Outbound::Put { soul, value: stored } if stored == value => return Ok(soul),
                Outbound::Err { message } => bail!("server rejected put: {message}"),
                _ => {}
            }
        }
    }

    /// Read a node by soul and wait for the reply.
    pub async fn fetch(&mut self, soul: &str, timeout: Duration) -> Result<Option<Value>> {
        self.get(soul).await?;
        loop {
            match self.recv_timeout(timeout).await? {
                Outbound::Get { soul: got, value } if got.as_str() == soul => return Ok(value),
                Outbound::Err { message } => bail!("server rejected get: {message}"),
                _ => {}
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.write.close().await.context("closing connection")
    }
}
