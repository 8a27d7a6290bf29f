use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket events from client to server.
///
/// Frames are JSON objects tagged with `type`; unknown tags fail to parse and
/// are reported back to the sender without touching any session state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "privateMessage")]
    PrivateMessage { to: Uuid, message: String },
}
