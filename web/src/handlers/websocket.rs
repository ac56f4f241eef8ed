//! WebSocket relay for lifecycle events.
//!
//! Every connection starts on the global channel. Clients may switch their
//! subscription at any time; notifications for a user channel are only
//! handed to that user, whatever the caller's role.
//!
//! ```text
//! Client                 WebSocket Handler                 EventBus
//!   │                            │                            │
//!   ├─ Connect ─────────────────>├─ subscribe([global]) ─────>│
//!   ├─ Subscribe [global,user:7]>├─ subscribe(...) ──────────>│
//!   │<─ Subscribed ──────────────┤                            │
//!   │                            │<── envelope (user:7) ──────┤
//!   │<─ Event ───────────────────┤                            │
//! ```
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! { "type": "subscribe", "channels": ["global", "user:7"] }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "type": "subscribed", "channels": ["global", "user:7"] }
//! { "type": "event", "channel": "global", "event": "center:updated", "data": { ... }, "occurred_at": "..." }
//! { "type": "error", "message": "..." }
//! { "type": "pong" }
//! ```

use crate::extractors::CurrentActor;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::StreamExt;
use relief_core::event::{Channel, EventEnvelope};
use relief_core::event_bus::{EventBus, EventBusError};
use relief_core::role::Actor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Replace the current subscription
    Subscribe {
        /// Channels to receive; empty means global only
        #[serde(default)]
        channels: Vec<Channel>,
    },
    /// Keep-alive
    Ping,
}

/// Server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Subscription accepted
    Subscribed {
        /// Channels now delivered
        channels: Vec<Channel>,
    },
    /// A published event
    Event(EventEnvelope),
    /// Request rejected
    Error {
        /// Error description
        message: String,
    },
    /// Keep-alive reply
    Pong,
}

/// Channels `actor` may receive out of `requested`.
///
/// # Errors
///
/// Names the first user channel the caller may not read.
pub fn permitted_channels(
    actor: Option<&Actor>,
    requested: Vec<Channel>,
) -> Result<Vec<Channel>, String> {
    if requested.is_empty() {
        return Ok(vec![Channel::Global]);
    }
    for channel in &requested {
        if let Channel::User(user) = channel {
            let allowed = actor.is_some_and(|a| &a.user_id == user);
            if !allowed {
                return Err(format!("not allowed to subscribe to '{channel}'"));
            }
        }
    }
    Ok(requested)
}

/// `GET /ws`: upgrade and relay events.
///
/// Anonymous callers may only follow the global channel.
#[allow(clippy::unused_async)]
pub async fn handle(
    ws: WebSocketUpgrade,
    actor: Option<CurrentActor>,
    State(bus): State<Arc<dyn EventBus>>,
) -> Response {
    let actor = actor.map(|CurrentActor(a)| a);
    debug!(user_id = ?actor.as_ref().map(|a| a.user_id.to_string()), "websocket connection requested");
    ws.on_upgrade(move |socket| serve(socket, bus, actor))
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket message");
            true
        }
    }
}

#[allow(clippy::cognitive_complexity)]
async fn serve(mut socket: WebSocket, bus: Arc<dyn EventBus>, actor: Option<Actor>) {
    let mut events = match bus.subscribe(&[Channel::Global]).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "websocket subscription failed");
            let _ = send(&mut socket, &ServerMessage::Error { message: err.to_string() }).await;
            return;
        }
    };
    info!("websocket connection established");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                let reply = match message {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Subscribe { channels }) => {
                            match permitted_channels(actor.as_ref(), channels) {
                                Ok(channels) => match bus.subscribe(&channels).await {
                                    Ok(stream) => {
                                        events = stream;
                                        debug!(?channels, "websocket subscription changed");
                                        ServerMessage::Subscribed { channels }
                                    }
                                    Err(err) => ServerMessage::Error { message: err.to_string() },
                                },
                                Err(message) => ServerMessage::Error { message },
                            }
                        }
                        Ok(ClientMessage::Ping) => ServerMessage::Pong,
                        Err(err) => ServerMessage::Error { message: format!("invalid message: {err}") },
                    },
                    Message::Close(_) => break,
                    _ => continue,
                };
                if !send(&mut socket, &reply).await {
                    break;
                }
            }
            next = events.next() => match next {
                Some(Ok(envelope)) => {
                    if !send(&mut socket, &ServerMessage::Event(envelope)).await {
                        break;
                    }
                }
                Some(Err(EventBusError::Lagged(missed))) => {
                    debug!(missed, "websocket subscriber lagged");
                }
                Some(Err(err)) => warn!(error = %err, "websocket event stream error"),
                None => {
                    debug!("event bus closed");
                    break;
                }
            },
        }
    }

    info!("websocket connection closed");
}
