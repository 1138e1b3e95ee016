//! Moderation console. Every route here sits behind `require_auth` and
//! `require_admin`; self-targeting account actions are refused.

use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;

use quill_db::models::PostPatch;
use quill_types::api::{
    AdminPostEditRequest, AnalyticsResponse, BlockResponse, CommentResponse, MessageResponse,
    PostResponse, RoleRequest, RoleResponse, TagsUpdatedResponse, UpdateTagsRequest, UserResponse,
};
use quill_types::models::Role;

use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};
use crate::middleware::Session;
use crate::policy;
use crate::posts::{apply_patch, load_post, normalize_tags, remove_post};
use crate::state::{AppState, run_db};
use crate::users::remove_user;
use crate::views;

// -- Users --

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let rows = run_db(&state, |db| db.list_users()).await?;
    Ok(Json(rows.iter().map(views::user).collect()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    policy::ensure_not_self(&session, id)?;

    remove_user(&state, &id.to_string()).await?;
    info!("Admin {} deleted user {}", session.user_id, id);
    Ok(Json(MessageResponse::new("User deleted")))
}

fn block_response(blocked: bool) -> Json<BlockResponse> {
    let message = if blocked { "User blocked" } else { "User unblocked" };
    Json(BlockResponse {
        message: message.into(),
        blocked,
    })
}

pub async fn toggle_block(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<BlockResponse>> {
    policy::ensure_not_self(&session, id)?;

    let key = id.to_string();
    let blocked = run_db(&state, move |db| db.toggle_user_blocked(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!("Admin {} set blocked={} on user {}", session.user_id, blocked, id);
    Ok(block_response(blocked))
}

async fn set_blocked(state: &AppState, session: &Session, id: Uuid, blocked: bool) -> ApiResult<Json<BlockResponse>> {
    policy::ensure_not_self(session, id)?;

    let key = id.to_string();
    if !run_db(state, move |db| db.set_user_blocked(&key, blocked)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("Admin {} set blocked={} on user {}", session.user_id, blocked, id);
    Ok(block_response(blocked))
}

pub async fn block_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<BlockResponse>> {
    set_blocked(&state, &session, id, true).await
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<BlockResponse>> {
    set_blocked(&state, &session, id, false).await
}

fn role_response(role: Role) -> Json<RoleResponse> {
    Json(RoleResponse {
        message: format!("User role updated to {}", role),
        role,
    })
}

pub async fn toggle_role(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    policy::ensure_not_self(&session, id)?;

    let key = id.to_string();
    let role = run_db(&state, move |db| db.toggle_user_role(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!("Admin {} changed role of {} to {}", session.user_id, id, role);
    Ok(role_response(role))
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    policy::ensure_not_self(&session, id)?;
    let role: Role = req
        .role
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role".into()))?;

    let key = id.to_string();
    if !run_db(&state, move |db| db.set_user_role(&key, role)).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("Admin {} changed role of {} to {}", session.user_id, id, role);
    Ok(role_response(role))
}

// -- Posts --

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<PostResponse>>> {
    let rows = run_db(&state, |db| db.list_posts()).await?;
    Ok(Json(views::posts(rows)))
}

pub async fn edit_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdminPostEditRequest>,
) -> ApiResult<Json<PostResponse>> {
    let existing = load_post(&state, id).await?;

    let keep_if_blank = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let patch = PostPatch {
        title: keep_if_blank(req.title),
        content: keep_if_blank(req.content),
        tags: req.tags.map(normalize_tags),
        ..PostPatch::default()
    };

    let updated = apply_patch(&state, &existing, patch).await?;
    Ok(Json(views::post(updated)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    remove_post(&state, id).await?;
    info!("Admin {} removed post {}", session.user_id, id);
    Ok(Json(MessageResponse::new("Post deleted")))
}

pub async fn reported_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<PostResponse>>> {
    let rows = run_db(&state, |db| db.list_reported_posts()).await?;
    Ok(Json(views::posts(rows)))
}

pub async fn clear_post_report(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.to_string();
    if !run_db(&state, move |db| db.set_post_reported(&key, false)).await? {
        return Err(ApiError::not_found("Post"));
    }
    Ok(Json(MessageResponse::new("Report cleared")))
}

pub async fn update_post_tags(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTagsRequest>,
) -> ApiResult<Json<TagsUpdatedResponse>> {
    let tags = normalize_tags(req.tags);
    let key = id.to_string();
    let row = run_db(&state, move |db| db.replace_post_tags(&key, &tags))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    Ok(Json(TagsUpdatedResponse {
        message: "Tags updated successfully".into(),
        post: views::post(row),
    }))
}

// -- Comments --

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.to_string();
    if !run_db(&state, move |db| db.delete_comment(&key)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    info!("Admin {} removed comment {}", session.user_id, id);
    Ok(Json(MessageResponse::new("Comment deleted")))
}

pub async fn reported_comments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let rows = run_db(&state, |db| db.list_reported_comments()).await?;
    Ok(Json(views::comments(rows)))
}

pub async fn clear_comment_report(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.to_string();
    if !run_db(&state, move |db| db.set_comment_reported(&key, false)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    Ok(Json(MessageResponse::new("Report cleared")))
}

// -- Analytics --

pub async fn analytics(State(state): State<AppState>) -> ApiResult<Json<AnalyticsResponse>> {
    let totals = run_db(&state, |db| db.analytics()).await?;
    Ok(Json(AnalyticsResponse {
        total_users: totals.total_users,
        total_posts: totals.total_posts,
        total_comments: totals.total_comments,
        total_likes: totals.total_likes,
    }))
}
