use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::auth::issue_token;
use crate::models::Role;
use crate::security::password::{hash_password, verify_password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let req = body.into_inner();
    let (email, password, role) = match (req.email, req.password, req.role) {
        (Some(e), Some(p), Some(r)) if !e.is_empty() && !p.is_empty() && !r.is_empty() => {
            (e, p, r)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Email, password, and role are required".into(),
            ))
        }
    };

    let role = Role::from_db(&role)
        .ok_or_else(|| AppError::BadRequest("Role must be either 'fan' or 'player'".into()))?;

    if !email.contains('@') {
        return Err(AppError::BadRequest("Please enter a valid email".into()));
    }
    if password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters long".into(),
        ));
    }

    if state.accounts.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("User already exists".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = state
        .accounts
        .create(req.name.as_deref(), &email, &password_hash, role)
        .await?;

    let token = issue_token(&user, &state.config)?;
    tracing::info!(user = %user.id, role = %user.role, "account registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully",
        "token": token,
    })))
}

#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let req = body.into_inner();
    let (email, password) = match (req.email, req.password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => {
            return Err(AppError::BadRequest(
                "Email and password are required".into(),
            ))
        }
    };

    let creds = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    if !verify_password(&password, &creds.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let user = creds.user;
    let token = issue_token(&user, &state.config)?;
    tracing::info!(user = %user.id, "login succeeded");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User logged in successfully",
        "token": token,
        "data": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
        },
    })))
}
