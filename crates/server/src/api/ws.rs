//! WebSocket support for real-time run status updates.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use dbexport_core::events::{RunEvent, RunEventSink};
use dbexport_core::Status;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Broadcaster for run status events using tokio broadcast channel.
///
/// The engine reports every status transition through the [`RunEventSink`]
/// implementation below; every connected WebSocket client gets the event as
/// JSON.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<RunEvent>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: RunEvent) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl RunEventSink for WsBroadcaster {
    async fn run_status_changed(&self, run_id: &str, status: Status) {
        self.broadcast(RunEvent::RunStatusChanged {
            run_id: run_id.to_string(),
            status,
        });
    }

    async fn group_status_changed(&self, run_id: &str, group_id: &str, status: Status) {
        self.broadcast(RunEvent::GroupStatusChanged {
            run_id: run_id.to_string(),
            group_id: group_id.to_string(),
            status,
        });
    }

    async fn script_status_changed(
        &self,
        run_id: &str,
        group_id: &str,
        script_id: &str,
        status: Status,
        message: Option<&str>,
    ) {
        self.broadcast(RunEvent::ScriptStatusChanged {
            run_id: run_id.to_string(),
            group_id: group_id.to_string(),
            script_id: script_id.to_string(),
            status,
            message: message.map(|m| m.to_string()),
        });
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcast events
    let mut rx = state.ws_broadcaster().subscribe();

    // Track connection metrics
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    // Spawn task to forward broadcast events to this client
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    // Track message by type
                    let event_type = match &event {
                        RunEvent::RunStatusChanged { .. } => "run_status_changed",
                        RunEvent::GroupStatusChanged { .. } => "group_status_changed",
                        RunEvent::ScriptStatusChanged { .. } => "script_status_changed",
                    };
                    WS_MESSAGES_SENT.with_label_values(&[event_type]).inc();

                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize RunEvent: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                    // Continue receiving - the client will catch up
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                // We don't expect any client messages, but log them
                debug!("Received text message: {}", text);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
