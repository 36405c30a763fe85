//! Bidirectional link to the experiment's logging server.
//!
//! Outbound: `RobotsMove` and other log records. Records produced while
//! the link is down wait in a FIFO queue and are flushed, oldest first, as
//! soon as the connection comes back; a record whose send fails is put
//! back at the front so ordering is preserved across reconnects.
//!
//! Inbound: game events from the sorting task (`cardReveal`,
//! `cardDropped`) plus server status notices, forwarded to the core.

use std::collections::VecDeque;

use futures_util::{SinkExt, StreamExt};
use gcs_types::{CoreEvent, GameEvent, GcsError, OutboundMessage, Side};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::backoff::Backoff;

/// FIFO buffer for log records awaiting a live connection.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<OutboundMessage>,
}

impl OutboundQueue {
    pub fn push(&mut self, msg: OutboundMessage) {
        self.messages.push_back(msg);
    }

    /// Put a message back at the front after a failed send.
    pub fn requeue(&mut self, msg: OutboundMessage) {
        self.messages.push_front(msg);
    }

    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Decode one inbound frame from the logging server.
pub fn parse_game_event(text: &str) -> Result<GameEvent, GcsError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| GcsError::Protocol(format!("invalid game frame: {e}")))?;

    match value.get("event").and_then(Value::as_str) {
        Some("cardReveal") => {
            let card_id = value
                .get("cardId")
                .and_then(Value::as_str)
                .ok_or_else(|| GcsError::Protocol("cardReveal without cardId".into()))?;
            let side = value
                .get("side")
                .and_then(Value::as_str)
                .and_then(Side::parse)
                .ok_or_else(|| GcsError::Protocol("cardReveal without valid side".into()))?;
            Ok(GameEvent::CardReveal {
                card_id: card_id.to_string(),
                side,
            })
        }
        Some("cardDropped") => {
            let card_id = value
                .get("cardId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(GameEvent::CardDropped {
                card_id: card_id.to_string(),
            })
        }
        other => {
            if let Some(status) = value.get("status").and_then(Value::as_str) {
                Ok(GameEvent::ServerStatus {
                    status: status.to_string(),
                    message: value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            } else {
                Ok(GameEvent::Unknown {
                    event: other.map(str::to_string),
                })
            }
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct GameLink {
    url: String,
    core_tx: mpsc::UnboundedSender<CoreEvent>,
    queue: OutboundQueue,
}

impl GameLink {
    pub fn new(url: impl Into<String>, core_tx: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Self {
            url: url.into(),
            core_tx,
            queue: OutboundQueue::default(),
        }
    }

    /// Run until both the outbound channel and the core channel are gone.
    pub async fn run(mut self, mut outbound: mpsc::UnboundedReceiver<OutboundMessage>) {
        let mut backoff = Backoff::new();
        loop {
            match connect_async(&self.url).await {
                Ok((ws, _)) => {
                    info!(url = %self.url, queued = self.queue.len(), "game link connected");
                    backoff.reset();
                    if self.pump(ws, &mut outbound).await {
                        return;
                    }
                    warn!(url = %self.url, "game link lost");
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "game connect failed");
                    // Keep draining producers so records accumulate in order.
                    while let Ok(msg) = outbound.try_recv() {
                        self.queue.push(msg);
                    }
                }
            }
            tokio::time::sleep(backoff.next()).await;
        }
    }

    /// Returns true when the producers are done and the link should stop.
    async fn pump(&mut self, ws: WsStream, outbound: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> bool {
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Flush the backlog before anything new.
        while let Some(msg) = self.queue.pop() {
            if ws_tx.send(Message::Text(msg.to_wire().into())).await.is_err() {
                self.queue.requeue(msg);
                return false;
            }
        }

        loop {
            tokio::select! {
                maybe = outbound.recv() => match maybe {
                    None => return true,
                    Some(msg) => {
                        if ws_tx.send(Message::Text(msg.to_wire().into())).await.is_err() {
                            self.queue.requeue(msg);
                            return false;
                        }
                    }
                },
                frame = ws_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => match parse_game_event(text.as_str()) {
                        Ok(event) => {
                            if self.core_tx.send(CoreEvent::Game(event)).is_err() {
                                return true;
                            }
                        }
                        Err(e) => warn!(error = %e, "bad game frame"),
                    },
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return false,
                    _ => {}
                },
            }
        }
    }
}
