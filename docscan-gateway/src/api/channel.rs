//! Result channel endpoint
//!
//! `GET /ws` upgrades to a WebSocket. The client announces
//! `{"id": ..., "type": ...}`; from then on batch results for that request id
//! are pushed to it as JSON text frames.

use crate::services::{ChannelRegistry, ChannelSession, ClientChannel};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// GET /ws
pub async fn channel_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = Arc::clone(&state.registry);
    let capacity = state.channel_capacity;
    ws.on_upgrade(move |socket| serve_channel(socket, registry, capacity))
}

/// Run one channel until the socket closes
async fn serve_channel(socket: WebSocket, registry: Arc<dyn ChannelRegistry>, capacity: usize) {
    let (mut sink, mut stream) = socket.split();
    let (channel, mut outbound) = ClientChannel::new(capacity);
    let channel_id = channel.id();
    let mut session = ChannelSession::new(channel);
    info!(channel_id = %channel_id, "Channel connected");

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, kind = message.kind(), "Failed to serialize channel message");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(error = %e, "Channel write failed");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_payload(&mut session, &text, registry.as_ref()).await;
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => handle_payload(&mut session, &text, registry.as_ref()).await,
                    Err(_) => warn!(channel_id = %channel_id, "Ignoring non-UTF-8 channel frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(channel_id = %channel_id, error = %e, "Channel read failed");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    session.close(registry.as_ref()).await;
    writer.abort();
    info!(channel_id = %channel_id, "Channel disconnected");
}

async fn handle_payload(session: &mut ChannelSession, payload: &str, registry: &dyn ChannelRegistry) {
    if let Err(e) = session.announce(payload, registry).await {
        warn!(
            channel_id = %session.channel().id(),
            error = %e,
            "Ignoring channel message"
        );
    }
}

/// Build channel routes
pub fn channel_routes() -> Router<AppState> {
    Router::new().route("/ws", get(channel_upgrade))
}
