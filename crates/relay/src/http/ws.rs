use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::http::api::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One forward loop per client over the shared outbound channel.
///
/// The protocol is receive-only: client frames are drained and ignored
/// (except close). A failed send or a closed socket tears down only this
/// connection; the feed and every other client keep going.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Realtime client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events_tx.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string(&*event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize wire event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Slow client: drop to the live edge instead of growing
                    // an unbounded queue.
                    warn!("Client lagged, dropped {} events", n);
                }
                Err(_) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                other => debug!("Ignoring client frame: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Realtime client disconnected");
}
