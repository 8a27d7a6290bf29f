pub mod auth;

pub use auth::{authenticate, issue_token, verify_jwt, AuthError, AuthedUser, Claims};
