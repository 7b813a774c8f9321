//! WebSocket push channel.
//!
//! Each connection registers one hub subscriber. A send task drains the
//! subscriber's queue onto the socket while a receive task feeds text frames to
//! [`SubscriptionHub::handle_inbound`](crate::hub::SubscriptionHub::handle_inbound).
//! When either side finishes the other is aborted and the subscriber is
//! unregistered.
//!
//! Inbound: `{"type":"subscribe"}`, `{"type":"get_strategy_status"}`,
//! `{"type":"toggle_strategy","strategy":"...","enabled":true}`.
//! Anything else is logged and ignored; the connection stays open.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tracing::{debug, info, warn};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// GET /ws - upgrade to the push channel
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut outbound) = state.hub.register().into_parts();

    info!(subscriber = %id, "WebSocket client connected");

    // Forward hub events to this client; ends when the hub drops the subscriber
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let inbound = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if let Err(e) = inbound.hub.handle_inbound(&inbound.store, id, text.as_str()) {
                        warn!(subscriber = %id, error = %e, "Control message ignored");
                    }
                }
                Message::Close(_) => break,
                _ => debug!(subscriber = %id, "Non-text frame ignored"),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(id);
    info!(subscriber = %id, "WebSocket client disconnected");
}
