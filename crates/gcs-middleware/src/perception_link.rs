//! Client link to the vision pipeline.
//!
//! Connects out to the perception WebSocket, decodes `faceDetection`
//! frames, and forwards them to the core. On any socket failure the link
//! reconnects with backoff; perception data is ephemeral, so nothing is
//! queued across an outage.

use futures_util::StreamExt;
use gcs_perception::wire::parse_face_detection;
use gcs_types::CoreEvent;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::backoff::Backoff;

pub struct PerceptionLink {
    url: String,
    core_tx: mpsc::UnboundedSender<CoreEvent>,
}

impl PerceptionLink {
    pub fn new(url: impl Into<String>, core_tx: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Self {
            url: url.into(),
            core_tx,
        }
    }

    /// Run until the core channel closes.
    pub async fn run(self) {
        let mut backoff = Backoff::new();
        loop {
            if self.core_tx.is_closed() {
                return;
            }
            match connect_async(&self.url).await {
                Ok((ws, _)) => {
                    info!(url = %self.url, "perception link connected");
                    backoff.reset();
                    self.pump(ws).await;
                    warn!(url = %self.url, "perception link lost");
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "perception connect failed");
                }
            }
            tokio::time::sleep(backoff.next()).await;
        }
    }

    async fn pump(
        &self,
        mut ws: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Text(text)) => match parse_face_detection(text.as_str()) {
                    Ok(Some(update)) => {
                        if self.core_tx.send(CoreEvent::Perception(update)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "bad perception frame"),
                },
                Ok(Message::Close(_)) | Err(_) => return,
                _ => {}
            }
        }
    }
}
