//! Realtime change notifications.
//!
//! Mutations publish named events on a broadcast channel; every connected
//! WebSocket client holds its own receiver. Nothing is queued for clients
//! that connect later, and a client that falls behind skips what it missed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::AppState;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 64;

/// Event names sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    AlimentCreated,
    AlimentUpdated,
    AlimentDeleted,
    UserCreated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AlimentCreated => "aliment-created",
            EventKind::AlimentUpdated => "aliment-updated",
            EventKind::AlimentDeleted => "aliment-deleted",
            EventKind::UserCreated => "user-created",
        }
    }
}

/// One frame on the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Broadcast publisher shared by all handlers.
pub struct Notifier {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send an event to every current subscriber. Never blocks; with no
    /// subscribers the event is dropped.
    pub fn publish<T: Serialize>(&self, kind: EventKind, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to encode {} event: {}", kind.as_str(), e);
                return;
            }
        };
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(event = kind.as_str(), subscriber_count, "Publishing event");
        let _ = self.tx.send(RealtimeEvent {
            event: kind.as_str().to_string(),
            payload,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// GET /ws - Upgrade to the realtime channel.
pub async fn realtime_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.notifier.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, events))
}

async fn forward_events(mut socket: WebSocket, mut events: broadcast::Receiver<RealtimeEvent>) {
    tracing::info!("client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Failed to encode frame: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime client fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let notifier = Notifier::new(8);
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        notifier.publish(EventKind::AlimentCreated, &json!({ "name": "Apple" }));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.event, "aliment-created");
        assert_eq!(e2.payload["name"], "Apple");
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_nothing() {
        let notifier = Notifier::new(8);
        notifier.publish(EventKind::AlimentDeleted, &json!({ "name": "Apple" }));

        let mut rx = notifier.subscribe();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let notifier = Notifier::default();
        notifier.publish(EventKind::UserCreated, &json!({ "username": "alice" }));

        let mut rx = notifier.subscribe();
        notifier.publish(EventKind::AlimentUpdated, &json!({ "name": "Apple" }));
        assert_eq!(rx.try_recv().unwrap().event, "aliment-updated");
    }
}
