//! `/live` WebSocket feed.
//!
//! A client gets one `snapshot` frame on connect and a `tick` frame after
//! every trading cycle. The socket is push-only; client messages are read
//! just to notice the close.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::routes::{AppState, LiveFrameKind};

/// GET /live
pub async fn live_feed(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: AppState) {
    // Subscribe first so no tick between snapshot and loop is lost.
    let mut ticks = state.subscribe();
    let (mut sink, mut stream) = socket.split();

    let snapshot = match serde_json::to_string(&state.live_frame(LiveFrameKind::Snapshot).await) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Failed to encode live snapshot");
            return;
        }
    };
    if sink.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    let mut push = tokio::spawn(async move {
        loop {
            match ticks.recv().await {
                Ok(frame) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Live client lagging, frames dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push => drain.abort(),
        _ = &mut drain => push.abort(),
    }
    debug!("Live client disconnected");
}
