use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use quill_db::models::{CommentRow, NewComment};
use quill_types::api::{
    CommentRequest, CommentResponse, CommentStatusResponse, MessageResponse, StatusRequest,
};
use quill_types::models::CommentStatus;

use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};
use crate::middleware::Session;
use crate::policy;
use crate::posts::load_post;
use crate::state::{AppState, run_db};
use crate::views;

/// Load a comment, optionally requiring it to sit under `post_id`.
async fn load_comment(state: &AppState, id: Uuid, post_id: Option<Uuid>) -> ApiResult<CommentRow> {
    let key = id.to_string();
    let row = run_db(state, move |db| db.get_comment(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    match post_id {
        Some(post_id) if row.post_id != post_id.to_string() => Err(ApiError::not_found("Comment")),
        _ => Ok(row),
    }
}

fn author_of(row: &CommentRow) -> ApiResult<Uuid> {
    row.author_id
        .parse()
        .map_err(|e| ApiError::internal("Corrupt comment record", e))
}

pub async fn list_for_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    load_post(&state, post_id).await?;

    let key = post_id.to_string();
    let rows = run_db(&state, move |db| db.list_comments_for_post(&key)).await?;
    Ok(Json(views::comments(rows)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".into()));
    }

    let comment = NewComment {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.to_string(),
        author_id: session.user_id.to_string(),
        content,
    };
    let row = run_db(&state, move |db| db.create_comment(&comment))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    info!("User {} commented on post {}", session.user_id, post_id);
    Ok((StatusCode::CREATED, Json(views::comment(row))))
}

async fn edit(
    state: &AppState,
    session: &Session,
    id: Uuid,
    post_id: Option<Uuid>,
    content: &str,
) -> ApiResult<CommentResponse> {
    let existing = load_comment(state, id, post_id).await?;
    policy::ensure_author(session, author_of(&existing)?)?;

    let content = content.trim().to_string();
    if content.is_empty() {
        return Ok(views::comment(existing));
    }

    let key = id.to_string();
    let row = run_db(state, move |db| db.update_comment_content(&key, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    Ok(views::comment(row))
}

async fn remove(state: &AppState, session: &Session, id: Uuid, post_id: Option<Uuid>) -> ApiResult<()> {
    let existing = load_comment(state, id, post_id).await?;
    policy::ensure_author(session, author_of(&existing)?)?;

    let key = id.to_string();
    if !run_db(state, move |db| db.delete_comment(&key)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    Ok(())
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    edit(&state, &session, id, None, &req.content).await.map(Json)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    remove(&state, &session, id, None).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

pub async fn edit_post_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath((post_id, id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    edit(&state, &session, id, Some(post_id), &req.content).await.map(Json)
}

pub async fn delete_post_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath((post_id, id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    remove(&state, &session, id, Some(post_id)).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

/// Admins see every comment; everyone else sees their own.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let author = (!policy::is_admin(&session)).then(|| session.user_id.to_string());
    let rows = run_db(&state, move |db| db.list_comments(author.as_deref())).await?;
    Ok(Json(views::comments(rows)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<CommentStatusResponse>> {
    policy::ensure_admin(&session)?;

    let status = req
        .status
        .trim()
        .parse::<CommentStatus>()
        .ok()
        .filter(|s| s.is_moderation_outcome())
        .ok_or_else(|| ApiError::BadRequest("Invalid status".into()))?;

    let key = id.to_string();
    let row = run_db(&state, move |db| db.set_comment_status(&key, status))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    info!("Admin {} marked comment {} {}", session.user_id, id, status);
    Ok(Json(CommentStatusResponse {
        message: format!("Comment {}", status),
        comment: views::comment(row),
    }))
}

pub async fn report_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.to_string();
    if !run_db(&state, move |db| db.set_comment_reported(&key, true)).await? {
        return Err(ApiError::not_found("Comment"));
    }
    info!("User {} reported comment {}", session.user_id, id);
    Ok(Json(MessageResponse::new("Comment reported")))
}
