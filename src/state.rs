use std::sync::Arc;

use crate::config::Config;
use crate::services::account_service::AccountStore;
use crate::services::message_service::MessageStore;
use crate::websocket::PresenceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: PresenceRegistry,
    pub config: Arc<Config>,
    pub accounts: Arc<dyn AccountStore>,
    pub messages: Arc<dyn MessageStore>,
}
