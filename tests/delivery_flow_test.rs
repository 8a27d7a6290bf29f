//! End-to-end tests for the delivery router and offline mailbox, driven
//! against in-memory store implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use fan_chat_service::error::AppError;
use fan_chat_service::models::{Message, Role, User};
use fan_chat_service::services::account_service::{AccountCredentials, AccountStore};
use fan_chat_service::services::delivery::{ChatError, DeliveryRouter};
use fan_chat_service::services::message_service::MessageStore;
use fan_chat_service::websocket::{ConnectionHandle, PresenceRegistry};

#[derive(Default)]
struct MemAccounts {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemAccounts {
    fn with_users(users: &[User]) -> Self {
        Self {
            users: Mutex::new(users.iter().map(|u| (u.id, u.clone())).collect()),
        }
    }
}

#[async_trait]
impl AccountStore for MemAccounts {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountCredentials>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .map(|u| AccountCredentials {
                user: u.clone(),
                password_hash: String::new(),
            }))
    }

    async fn create(
        &self,
        name: Option<&str>,
        email: &str,
        _password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.map(str::to_owned),
            email: email.to_owned(),
            role,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }
}

#[derive(Default)]
struct MemMessages {
    rows: Mutex<Vec<Message>>,
}

impl MemMessages {
    fn all(&self) -> Vec<Message> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStore for MemMessages {
    async fn create(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        delivered: bool,
    ) -> Result<Message, AppError> {
        let mut rows = self.rows.lock().unwrap();
        // Strictly increasing timestamps so creation order is observable.
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
            + Duration::seconds(rows.len() as i64);
        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: content.to_owned(),
            delivered,
            created_at,
        };
        rows.push(message.clone());
        Ok(message)
    }

    async fn find_undelivered(&self, receiver_id: Uuid) -> Result<Vec<Message>, AppError> {
        let mut pending: Vec<Message> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.receiver_id == receiver_id && !m.delivered)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.created_at);
        Ok(pending)
    }

    async fn mark_delivered(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for row in rows.iter_mut() {
            if !row.delivered && ids.contains(&row.id) {
                row.delivered = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn conversation_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError> {
        let mut pair: Vec<Message> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b)
                    || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect();
        pair.sort_by_key(|m| std::cmp::Reverse(m.created_at));
        Ok(pair)
    }
}

fn fan(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: Some(name.to_owned()),
        email: format!("{name}@example.com"),
        role: Role::Fan,
        created_at: Utc::now(),
    }
}

fn player(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: Some(name.to_owned()),
        email: format!("{name}@example.com"),
        role: Role::Player,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn online_recipient_receives_pushed_message() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let (handle, mut rx) = ConnectionHandle::new();
    registry.register(p.id, handle);

    let outcome = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "hi")
        .await
        .unwrap();

    assert!(outcome.receiver_online);
    assert!(outcome.pushed);
    assert!(outcome.message.delivered);

    let frame = rx.try_recv().unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "message");
    assert_eq!(value["message"], "hi");
    assert_eq!(value["delivered"], true);
    assert_eq!(value["senderId"], f.id.to_string());
}

#[tokio::test]
async fn offline_recipient_gets_a_queued_record() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let outcome = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "you there?")
        .await
        .unwrap();

    assert!(!outcome.receiver_online);
    assert!(outcome.queued());
    assert!(!outcome.message.delivered);

    let stored = messages.all();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].delivered);
}

#[tokio::test]
async fn reconnect_flushes_offline_mail_in_creation_order_exactly_once() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "first")
        .await
        .unwrap();
    DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "second")
        .await
        .unwrap();

    // Connection setup: fetch pending mail, push, then mark delivered.
    let pending = messages.find_undelivered(p.id).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].content, "first");
    assert_eq!(pending[1].content, "second");

    let ids: Vec<Uuid> = pending.iter().map(|m| m.id).collect();
    assert_eq!(messages.mark_delivered(&ids).await.unwrap(), 2);

    // A second flush finds nothing; the records stayed put, flags flipped.
    assert!(messages.find_undelivered(p.id).await.unwrap().is_empty());
    assert!(messages.all().iter().all(|m| m.delivered));
}

#[tokio::test]
async fn same_role_send_is_rejected_without_a_store_write() {
    let f1 = fan("frankie");
    let f2 = fan("freddie");
    let accounts = MemAccounts::with_users(&[f1.clone(), f2.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let err = DeliveryRouter::route(&accounts, &messages, &registry, &f1, f2.id, "hey")
        .await
        .unwrap_err();

    match &err {
        ChatError::SameRoleNotAllowed {
            sender_role,
            receiver_role,
        } => {
            assert_eq!(*sender_role, Role::Fan);
            assert_eq!(*receiver_role, Role::Fan);
        }
        other => panic!("expected SameRoleNotAllowed, got {other:?}"),
    }
    // The rejection text names the offending roles.
    assert!(err.to_string().contains("(fan)"));
    assert!(messages.all().is_empty());
}

#[tokio::test]
async fn self_send_is_rejected_without_a_store_write() {
    let f = fan("frankie");
    let accounts = MemAccounts::with_users(&[f.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let err = DeliveryRouter::route(&accounts, &messages, &registry, &f, f.id, "note to self")
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::SelfMessage));
    assert!(messages.all().is_empty());
}

#[tokio::test]
async fn unknown_recipient_is_rejected_without_a_store_write() {
    let f = fan("frankie");
    let accounts = MemAccounts::with_users(&[f.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let err = DeliveryRouter::route(&accounts, &messages, &registry, &f, Uuid::new_v4(), "hello?")
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::UnknownRecipient));
    assert!(messages.all().is_empty());
}

#[tokio::test]
async fn empty_payload_is_rejected_without_a_store_write() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let err = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "   ")
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::EmptyMessage));
    assert!(messages.all().is_empty());
}

#[tokio::test]
async fn dead_handle_is_evicted_and_message_reported_queued() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    // Registered but the receiving side is gone: push fails fast.
    let (handle, rx) = ConnectionHandle::new();
    registry.register(p.id, handle);
    drop(rx);

    let outcome = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "hi")
        .await
        .unwrap();

    assert!(outcome.receiver_online);
    assert!(!outcome.pushed);
    assert!(outcome.queued());
    assert!(!registry.is_online(p.id));
}

#[tokio::test]
async fn presence_is_rechecked_at_send_time() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    let (handle, _rx) = ConnectionHandle::new();
    let connection_id = handle.id();
    registry.register(p.id, handle);

    let online = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "one")
        .await
        .unwrap();
    assert!(online.message.delivered);

    registry.unregister(p.id, connection_id);

    let offline = DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "two")
        .await
        .unwrap();
    assert!(!offline.message.delivered);
    assert!(offline.queued());
}

#[tokio::test]
async fn conversation_history_is_newest_first() {
    let f = fan("frankie");
    let p = player("paula");
    let accounts = MemAccounts::with_users(&[f.clone(), p.clone()]);
    let messages = MemMessages::default();
    let registry = PresenceRegistry::new();

    DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "oldest")
        .await
        .unwrap();
    DeliveryRouter::route(&accounts, &messages, &registry, &f, p.id, "newest")
        .await
        .unwrap();

    let history = messages.conversation_between(f.id, p.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "newest");
    assert_eq!(history[1].content, "oldest");
}
