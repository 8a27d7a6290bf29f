pub mod account_service;
pub mod delivery;
pub mod message_service;
