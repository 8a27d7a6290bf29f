use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConnectionHandle, PresenceRegistry, TransportError};
use crate::models::{Message, Role};

/// Outbound WebSocket events from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// Broadcast when a user's connection becomes active.
    #[serde(rename = "userOnline")]
    UserOnline {
        #[serde(rename = "userId")]
        user_id: Uuid,
        name: Option<String>,
        role: Role,
    },

    /// Broadcast when a user's connection closes.
    #[serde(rename = "userOffline")]
    UserOffline {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },

    /// A persisted message record, pushed to the receiver and echoed to the
    /// sender.
    #[serde(rename = "message")]
    Message(Message),

    /// Human-readable error or advisory text, sent to the offending sender
    /// only.
    #[serde(rename = "chatError")]
    ChatError { message: String },
}

impl WsOutboundEvent {
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Fan an event out to every registered connection.
///
/// Handles whose receiving side is gone are evicted, so a broken connection
/// cannot accumulate in the registry past its first missed broadcast.
pub fn broadcast_event(registry: &PresenceRegistry, event: &WsOutboundEvent) {
    let frame = match event.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode broadcast event");
            return;
        }
    };

    for (user_id, handle) in registry.entries() {
        if handle.send(frame.clone()).is_err() {
            registry.unregister(user_id, handle.id());
            tracing::debug!(%user_id, "evicted dead connection during broadcast");
        }
    }
}

/// Push an event to a single connection handle.
pub fn send_event(handle: &ConnectionHandle, event: &WsOutboundEvent) -> Result<(), TransportError> {
    let frame = event.to_frame().map_err(|_| TransportError)?;
    handle.send(frame)
}
