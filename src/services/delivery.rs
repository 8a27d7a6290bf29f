use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Message, Role, User};
use crate::services::account_service::AccountStore;
use crate::services::message_service::MessageStore;
use crate::websocket::events::{send_event, WsOutboundEvent};
use crate::websocket::PresenceRegistry;

/// Business-rule rejection of a send attempt. Reported to the offending
/// sender as a `chatError` frame; the connection stays active.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Recipient not found")]
    UnknownRecipient,

    #[error("You cannot send a message to yourself")]
    SelfMessage,

    #[error("Your role ({sender_role}) is only allowed to chat with users of the opposite role. You tried to message a user with role ({receiver_role}).")]
    SameRoleNotAllowed {
        sender_role: Role,
        receiver_role: Role,
    },

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message could not be stored, please try again")]
    Store(#[source] AppError),
}

/// Pair rules shared by the send path and the conversation-history lookup:
/// no self-messaging, and messaging only across the two roles.
pub fn validate_pair(sender: &User, receiver: &User) -> Result<(), ChatError> {
    if sender.id == receiver.id {
        return Err(ChatError::SelfMessage);
    }
    if sender.role == receiver.role {
        return Err(ChatError::SameRoleNotAllowed {
            sender_role: sender.role,
            receiver_role: receiver.role,
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub message: Message,
    pub receiver_online: bool,
    /// Whether the live push to the receiver actually went through. False
    /// with `receiver_online = true` means the handle was dead and has been
    /// evicted.
    pub pushed: bool,
}

impl DeliveryOutcome {
    pub fn queued(&self) -> bool {
        !self.pushed
    }
}

pub struct DeliveryRouter;

impl DeliveryRouter {
    /// Validate, persist, and route one inbound message.
    ///
    /// Validation failures produce no side effects. Once the record is
    /// persisted, a failed push to the receiver does not roll anything back:
    /// the stored record is the durable source of truth, and delivery is
    /// at-least-once.
    pub async fn route(
        accounts: &dyn AccountStore,
        messages: &dyn MessageStore,
        registry: &PresenceRegistry,
        sender: &User,
        receiver_id: Uuid,
        content: &str,
    ) -> Result<DeliveryOutcome, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let receiver = accounts
            .find_by_id(receiver_id)
            .await
            .map_err(ChatError::Store)?
            .ok_or(ChatError::UnknownRecipient)?;

        validate_pair(sender, &receiver)?;

        // Presence is read at send time, never from a cached snapshot, so a
        // concurrent disconnect at worst routes this one message to the
        // offline mailbox.
        let receiver_online = registry.is_online(receiver_id);

        let message = messages
            .create(sender.id, receiver_id, content, receiver_online)
            .await
            .map_err(ChatError::Store)?;

        let mut pushed = false;
        if receiver_online {
            if let Some(handle) = registry.lookup(receiver_id) {
                match send_event(&handle, &WsOutboundEvent::Message(message.clone())) {
                    Ok(()) => pushed = true,
                    Err(_) => {
                        registry.unregister(receiver_id, handle.id());
                        tracing::warn!(
                            receiver = %receiver_id,
                            message_id = %message.id,
                            "push to registered connection failed, recipient treated as offline"
                        );
                    }
                }
            }
        }

        Ok(DeliveryOutcome {
            message,
            receiver_online,
            pushed,
        })
    }
}
