//! WebSocket push channel.
//!
//! Every connected client receives every domain event as JSON, e.g.
//!
//! ```json
//! { "type": "booking:cancelled", "bookingId": "...", "courtId": "...", "startTime": "...", "endTime": "..." }
//! ```
//!
//! Events are hints to re-fetch; the HTTP API stays the source of truth.
//! Clients may send `{"type":"ping"}` and get `{"type":"pong"}` back; other
//! client messages are ignored.

use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use courtside_core::DomainEvent;
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Control messages exchanged outside the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Keep-alive from the client
    Ping,
    /// Reply to a ping
    Pong,
    /// Events were dropped because the client fell behind
    Lagged {
        /// How many
        skipped: u64,
    },
}

/// `GET /ws`: upgrade to the push channel.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    debug!("WebSocket connection requested");
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

/// Run one connection until either side closes.
async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<DomainEvent>) {
    info!("WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let (control_tx, mut control_rx) = mpsc::channel::<ControlMessage>(8);

    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => serde_json::to_string(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagging, events dropped");
                        serde_json::to_string(&ControlMessage::Lagged { skipped })
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                control = control_rx.recv() => match control {
                    Some(message) => serde_json::to_string(&message),
                    None => break,
                },
            };
            let text = match text {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize push message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                // Client disconnected
                break;
            }
        }
        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ControlMessage>(&text) {
                    Ok(ControlMessage::Ping) => {
                        if control_tx.send(ControlMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                    Ok(other) => debug!(?other, "Ignoring client control message"),
                    Err(_) => debug!("Ignoring unrecognised client message"),
                },
                Message::Close(_) => {
                    debug!("Client requested close");
                    break;
                }
                // Protocol pings are answered by axum
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("WebSocket connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn control_messages_use_a_type_tag() {
        assert_eq!(
            serde_json::to_string(&ControlMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControlMessage::Lagged { skipped: 3 }).unwrap(),
            r#"{"type":"lagged","skipped":3}"#
        );
        let parsed: ControlMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed, ControlMessage::Ping);
    }
}
