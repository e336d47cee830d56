use crate::gateway::events::EventBroadcaster;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// One-way event stream: every conversation/log event is pushed to each
/// connected client as a JSON text frame. Clients only send pings.
pub struct GatewayServer {
    broadcaster: Arc<EventBroadcaster>,
}

impl GatewayServer {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { broadcaster }
    }

    pub async fn run(
        &self,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("Gateway WebSocket server listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    log::info!("New WebSocket connection from {}", peer_addr);
                    let broadcaster = self.broadcaster.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, broadcaster).await {
                            log::error!("Connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    broadcaster: Arc<EventBroadcaster>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (client_id, mut event_rx) = broadcaster.subscribe();

    loop {
        tokio::select! {
            // Forward events
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if ws_sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::error!("WebSocket error: {}", e);
                        break;
                    }
                    // The gateway stream is push-only
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    broadcaster.unsubscribe(&client_id);

    Ok(())
}
