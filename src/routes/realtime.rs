use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

#[axum::debug_handler]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Forwards broadcast events to one client until either side closes.
/// There is no replay: events published while the client is disconnected
/// or lagging are gone.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let mut events = state.realtime.subscribe();
    tracing::debug!(
        subscribers = state.realtime.subscriber_count(),
        "websocket client connected"
    );

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize realtime event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket client lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!("websocket client disconnected");
}
