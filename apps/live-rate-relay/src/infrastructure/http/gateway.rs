//! Subscriber Gateway
//!
//! `GET /ws/stream` upgrades to a WebSocket session. Each session is
//! registered with the broadcaster before the snapshot is taken, so no
//! update can fall between the `initialStore` envelope and the live stream.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use super::SharedAppState;
use crate::domain::streaming::InitialStore;

pub(super) async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedAppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedAppState) {
    let (id, mut updates) = state.broadcaster.register();
    tracing::info!(subscriber = %id, "Subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    // Queued updates stay buffered until the snapshot is out.
    let snapshot = state.cache.snapshot();
    let initial = match serde_json::to_string(&InitialStore::new(&snapshot)) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(subscriber = %id, error = %e, "Failed to serialize initial store");
            state.broadcaster.unregister(id);
            return;
        }
    };

    if sender.send(Message::Text(initial.into())).await.is_err() {
        tracing::debug!(subscriber = %id, "Subscriber gone before initial store");
        state.broadcaster.unregister(id);
        return;
    }

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            update = updates.recv() => {
                let Some(text) = update else { break };
                if let Err(e) = sender.send(Message::Text(text)).await {
                    tracing::debug!(subscriber = %id, error = %e, "Send to subscriber failed");
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    // Subscribers have nothing to say; pings are answered by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.broadcaster.unregister(id);
    tracing::info!(subscriber = %id, "Subscriber disconnected");
}
