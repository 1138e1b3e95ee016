use axum::{Extension, Json, extract::State};
use tracing::info;

use quill_types::api::{
    ChangePasswordRequest, DeleteAccountRequest, MessageResponse, UpdateProfileRequest,
    UserResponse,
};

use crate::auth::{hash_password, validate_password, verify_password};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::middleware::Session;
use crate::state::{AppState, run_db};
use crate::views;

const MAX_NAME_CHARS: usize = 64;

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Delete an account and everything it owns, then drop its cover images.
pub(crate) async fn remove_user(state: &AppState, id: &str) -> ApiResult<()> {
    let key = id.to_string();
    let covers = run_db(state, move |db| db.delete_user(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    for cover in &covers {
        state.uploads.remove(cover).await;
    }
    Ok(())
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    // an empty name keeps the current one
    let name = trimmed(req.name).filter(|n| !n.is_empty());
    if name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_CHARS) {
        return Err(ApiError::BadRequest(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_CHARS
        )));
    }
    let avatar = trimmed(req.avatar);
    let bio = trimmed(req.bio);

    let id = session.user_id.to_string();
    let row = run_db(&state, move |db| {
        db.update_profile(&id, name.as_deref(), avatar.as_deref(), bio.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(views::user(&row)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = session.user_id.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !verify_password(&req.old_password, &user.password)? {
        return Err(ApiError::BadRequest("Old password incorrect".into()));
    }
    validate_password(&req.new_password)?;

    let new_hash = hash_password(&req.new_password)?;
    let id = user.id.clone();
    if !run_db(&state, move |db| db.update_password(&id, &new_hash)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("User {} changed their password", user.id);
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = session.user_id.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::BadRequest("Password incorrect".into()));
    }

    remove_user(&state, &user.id).await?;
    info!("User {} deleted their account", user.id);
    Ok(Json(MessageResponse::new("Account deleted")))
}
