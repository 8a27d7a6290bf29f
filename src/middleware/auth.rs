use std::future::Future;
use std::pin::Pin;

use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::services::account_service::AccountStore;
use crate::state::AppState;

/// Connection-time authentication failure. None of these ever produce a
/// session; the connection is rejected before any presence state exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authorized, token missing")]
    MissingCredential,

    #[error("Invalid token, please log in again")]
    InvalidCredential,

    #[error("Token has expired, please log in again")]
    ExpiredCredential,

    #[error("Not authorized, user not found")]
    UnknownIdentity,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(user: &User, config: &Config) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iss: config.token_issuer.clone(),
        iat: now,
        exp: now + config.jwt_expires_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredCredential,
        _ => AuthError::InvalidCredential,
    })
}

/// Accept the raw token or an RFC 6750 `Bearer `-prefixed one.
pub fn extract_bearer(value: &str) -> &str {
    value.strip_prefix("Bearer ").unwrap_or(value).trim()
}

/// Credential lookup order for connections: `authorization` header first,
/// query parameter of the same name as fallback. First non-empty value wins.
pub fn credential_from_request(req: &HttpRequest, query_token: Option<&str>) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(extract_bearer)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            query_token
                .map(extract_bearer)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
}

/// Resolve a presented credential to an account, or fail closed.
///
/// Absence of the referenced account (deleted since the token was issued)
/// is `UnknownIdentity`; store failures surface as database errors.
pub async fn authenticate(
    accounts: &dyn AccountStore,
    config: &Config,
    token: Option<String>,
) -> Result<User, AppError> {
    let token = token.ok_or(AuthError::MissingCredential)?;
    let claims = verify_jwt(&token, &config.jwt_secret)?;

    let user = accounts
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;

    Ok(user)
}

/// Authenticated account extracted from the `authorization` header of an
/// HTTP request. Rejects with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub User);

impl FromRequest for AuthedUser {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = credential_from_request(req, None);

        Box::pin(async move {
            let state = state.ok_or(AppError::Internal)?;
            let user = authenticate(state.accounts.as_ref(), &state.config, token).await?;
            Ok(AuthedUser(user))
        })
    }
}
