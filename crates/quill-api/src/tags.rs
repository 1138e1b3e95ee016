//! Admin tag catalog.

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use quill_db::models::TagWrite;
use quill_types::api::{MessageResponse, TagRequest, TagResponse};

use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};
use crate::middleware::Session;
use crate::state::{AppState, run_db};
use crate::views;

fn tag_name(req: &TagRequest) -> ApiResult<String> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Tag name is required".into()));
    }
    Ok(name.to_string())
}

fn written(outcome: TagWrite) -> ApiResult<TagResponse> {
    match outcome {
        TagWrite::Written(row) => Ok(views::tag(&row)),
        TagWrite::Duplicate => Err(ApiError::BadRequest("Tag already exists".into())),
        TagWrite::Missing => Err(ApiError::not_found("Tag")),
    }
}

pub async fn create_tag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<TagRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = tag_name(&req)?;
    let id = Uuid::new_v4().to_string();
    let tag = written(run_db(&state, move |db| db.create_tag(&id, &name)).await?)?;

    info!("Admin {} created tag '{}'", session.user_id, tag.name);
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<TagResponse>>> {
    let rows = run_db(&state, |db| db.list_tags()).await?;
    Ok(Json(rows.iter().map(views::tag).collect()))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TagRequest>,
) -> ApiResult<Json<TagResponse>> {
    let name = tag_name(&req)?;
    let key = id.to_string();
    let tag = written(run_db(&state, move |db| db.rename_tag(&key, &name)).await?)?;

    info!("Admin {} renamed tag {} to '{}'", session.user_id, id, tag.name);
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.to_string();
    if !run_db(&state, move |db| db.delete_tag(&key)).await? {
        return Err(ApiError::not_found("Tag"));
    }

    info!("Admin {} deleted tag {}", session.user_id, id);
    Ok(Json(MessageResponse::new("Tag deleted")))
}
