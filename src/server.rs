//! WebSocket presence sink.
//!
//! Presence updates are broadcast as JSON [`PresenceEvent`]s to every
//! connected dashboard client. New clients first receive the current
//! display names and status.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info};

use ticker_presence_core::{PresenceError, PresenceSink};
use ticker_presence_types::{Mood, PresenceEvent};

#[derive(Debug, Default)]
struct PresenceView {
    names: HashMap<String, String>,
    status: Option<(String, Mood)>,
}

/// A [`PresenceSink`] that fans updates out over a broadcast channel.
pub struct BroadcastPresenceSink {
    targets: Vec<String>,
    view: RwLock<PresenceView>,
    event_tx: broadcast::Sender<PresenceEvent>,
}

impl BroadcastPresenceSink {
    pub fn new(targets: Vec<String>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            targets,
            view: RwLock::new(PresenceView::default()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.event_tx.subscribe()
    }

    /// Events describing the current presence, for newly connected clients.
    pub async fn current(&self) -> Vec<PresenceEvent> {
        let view = self.view.read().await;
        let mut events: Vec<PresenceEvent> = self
            .targets
            .iter()
            .filter_map(|target| {
                view.names.get(target).map(|text| PresenceEvent::DisplayName {
                    target: target.clone(),
                    text: text.clone(),
                })
            })
            .collect();
        if let Some((text, mood)) = &view.status {
            events.push(PresenceEvent::Status {
                text: text.clone(),
                mood: *mood,
            });
        }
        events
    }

    fn broadcast(&self, event: PresenceEvent) {
        // No connected clients is not an error
        if self.event_tx.send(event).is_err() {
            debug!("No presence clients connected");
        }
    }
}

#[async_trait]
impl PresenceSink for BroadcastPresenceSink {
    async fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    async fn display_name(&self, target: &str) -> Option<String> {
        self.view.read().await.names.get(target).cloned()
    }

    async fn set_display_name(&self, target: &str, text: &str) -> Result<(), PresenceError> {
        if !self.targets.iter().any(|t| t == target) {
            return Err(PresenceError::Unreachable(target.to_string()));
        }

        self.view
            .write()
            .await
            .names
            .insert(target.to_string(), text.to_string());
        self.broadcast(PresenceEvent::DisplayName {
            target: target.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_status(&self, text: &str, mood: Mood) -> Result<(), PresenceError> {
        self.view.write().await.status = Some((text.to_string(), mood));
        self.broadcast(PresenceEvent::Status {
            text: text.to_string(),
            mood,
        });
        Ok(())
    }
}

/// Run the WebSocket server for presence clients.
pub async fn run_server(addr: &str, sink: Arc<BroadcastPresenceSink>) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind server to {}: {}", addr, e);
            return;
        }
    };

    info!("Presence WebSocket server listening on {}", addr);

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let sink = sink.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, peer_addr, &sink).await {
                debug!("Client {} error: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    sink: &BroadcastPresenceSink,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Subscribe before the snapshot so no update falls in between
    let mut event_rx = sink.subscribe();

    debug!("Client {} connected", peer_addr);

    for event in sink.current().await {
        ws_sender
            .send(Message::Text(serde_json::to_string(&event)?))
            .await?;
    }

    loop {
        tokio::select! {
            // Forward presence updates to client
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = serde_json::to_string(&event)?;
                        if ws_sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            // Handle incoming messages (ping/pong and close)
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    debug!("Client {} disconnected", peer_addr);
    Ok(())
}
