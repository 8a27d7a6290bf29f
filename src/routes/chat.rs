use actix_web::{get, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthedUser;
use crate::services::delivery::{validate_pair, ChatError};
use crate::state::AppState;

/// Two-party conversation history, newest first. Applies the same pair
/// validation as the live send path.
#[get("/chat/{id}")]
pub async fn conversation(
    state: web::Data<AppState>,
    user: AuthedUser,
    other_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let me = user.0;
    let other_id = other_id.into_inner();

    let other = state
        .accounts
        .find_by_id(other_id)
        .await?
        .ok_or(AppError::NotFound)?;

    validate_pair(&me, &other).map_err(|e| match e {
        ChatError::SameRoleNotAllowed { .. } => {
            AppError::Forbidden("Chat not allowed between same roles".into())
        }
        other => AppError::BadRequest(other.to_string()),
    })?;

    let conversation = state.messages.conversation_between(me.id, other_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Conversation retrieved successfully",
        "conversation": conversation,
    })))
}
