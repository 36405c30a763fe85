//! Status WebSocket server.
//!
//! Serves the renderer and the experimenter console. Every connected
//! client receives the per-tick [`StatusSummary`] stream as JSON; text
//! frames coming the other way are commands:
//!
//! * `{"topic": "/gaze/manual", "side": "left"}` – immediate initiating
//!   gaze bid, same gating as the automatic path.
//! * `{"topic": "/condition", "condition": "ryan"}` – activate a
//!   condition, normalising its dependent flags.
//! * `{"topic": "/flags", "initiating": true}` – individual toggle
//!   changes; any subset of `initiating`, `responding`, `knowledge_high`,
//!   `knowledge_low` may appear.
//! * `{"topic": "/log", "payload": {"action": "logEvent", ...}}` – a
//!   round/session log record from the surrounding experiment, funneled
//!   into the same outbound queue as the core's own records.
//!
//! Frames matching none of these are ignored.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use gcs_types::{
    Condition, CoreEvent, FlagChange, GcsError, OutboundMessage, Side, StatusSummary,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct StatusServer {
    status_tx: broadcast::Sender<StatusSummary>,
    core_tx: mpsc::UnboundedSender<CoreEvent>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl StatusServer {
    pub fn new(
        status_tx: broadcast::Sender<StatusSummary>,
        core_tx: mpsc::UnboundedSender<CoreEvent>,
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Self {
        Self {
            status_tx,
            core_tx,
            outbound_tx,
        }
    }

    /// Bind and serve until a fatal bind error.
    pub async fn run(self, addr: SocketAddr) -> Result<(), GcsError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GcsError::Transport(format!("status bind error on {addr}: {e}")))?;
        info!(%addr, "status server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "status client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "status accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), GcsError> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| GcsError::Transport(format!("status handshake from {peer}: {e}")))?;
        let (mut ws_tx, mut ws_rx) = ws.split();
        let mut status_rx = self.status_tx.subscribe();

        loop {
            tokio::select! {
                result = status_rx.recv() => match result {
                    Ok(status) => {
                        let json = serde_json::to_string(&status)
                            .map_err(|e| GcsError::Protocol(e.to_string()))?;
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(peer = %peer, lagged_by = n, "status client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_command(text.as_str()),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                },
            }
        }

        Ok(())
    }

    fn handle_command(&self, text: &str) {
        let Ok(json) = serde_json::from_str::<serde_json::Value>(text) else {
            return;
        };
        let topic = json.get("topic").and_then(|t| t.as_str()).unwrap_or("");

        match topic {
            "/gaze/manual" => {
                if let Some(side) = json.get("side").and_then(|s| s.as_str()).and_then(Side::parse)
                {
                    let _ = self.core_tx.send(CoreEvent::ManualGaze(side));
                }
            }
            "/condition" => {
                if let Some(condition) = json
                    .get("condition")
                    .and_then(|c| c.as_str())
                    .and_then(Condition::parse)
                {
                    let _ = self
                        .core_tx
                        .send(CoreEvent::Flag(FlagChange::Condition(condition)));
                }
            }
            "/flags" => {
                let toggles = [
                    ("initiating", FlagChange::Initiating as fn(bool) -> FlagChange),
                    ("responding", FlagChange::Responding),
                    ("knowledge_high", FlagChange::KnowledgeHigh),
                    ("knowledge_low", FlagChange::KnowledgeLow),
                ];
                for (key, make) in toggles {
                    if let Some(on) = json.get(key).and_then(|v| v.as_bool()) {
                        let _ = self.core_tx.send(CoreEvent::Flag(make(on)));
                    }
                }
            }
            "/log" => {
                if let Some(payload) = json.get("payload").filter(|p| p.is_object()) {
                    let _ = self
                        .outbound_tx
                        .send(OutboundMessage::passthrough(payload.clone()));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> (
        StatusServer,
        mpsc::UnboundedReceiver<CoreEvent>,
        mpsc::UnboundedReceiver<OutboundMessage>,
    ) {
        let (status_tx, _) = broadcast::channel(16);
        let (core_tx, core_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            StatusServer::new(status_tx, core_tx, outbound_tx),
            core_rx,
            outbound_rx,
        )
    }

    #[test]
    fn manual_gaze_command_is_forwarded() {
        let (srv, mut rx, _out) = server();
        srv.handle_command(r#"{"topic":"/gaze/manual","side":"left"}"#);
        assert_eq!(rx.try_recv().unwrap(), CoreEvent::ManualGaze(Side::Left));
    }

    #[test]
    fn condition_command_is_forwarded() {
        let (srv, mut rx, _out) = server();
        srv.handle_command(r#"{"topic":"/condition","condition":"carl"}"#);
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Flag(FlagChange::Condition(Condition::Carl))
        );
    }

    #[test]
    fn flag_commands_fan_out_per_key() {
        let (srv, mut rx, _out) = server();
        srv.handle_command(r#"{"topic":"/flags","initiating":true,"knowledge_low":true}"#);
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Flag(FlagChange::Initiating(true))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Flag(FlagChange::KnowledgeLow(true))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn log_passthrough_rides_the_outbound_queue() {
        let (srv, mut rx, mut out) = server();
        srv.handle_command(
            r#"{"topic":"/log","payload":{"action":"logEvent","event":"roundComplete","round":3}}"#,
        );
        let msg = out.try_recv().unwrap();
        assert_eq!(msg.value()["event"], "roundComplete");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_and_unknown_commands_are_ignored() {
        let (srv, mut rx, mut out) = server();
        srv.handle_command("{not json");
        srv.handle_command(r#"{"topic":"/unknown","side":"left"}"#);
        srv.handle_command(r#"{"topic":"/gaze/manual","side":"up"}"#);
        srv.handle_command(r#"{"topic":"/log","payload":"not-an-object"}"#);
        assert!(rx.try_recv().is_err());
        assert!(out.try_recv().is_err());
    }
}
