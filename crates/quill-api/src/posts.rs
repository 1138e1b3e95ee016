use axum::{
    Extension, Json,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use quill_db::models::{NewPost, PostFilter, PostPatch, PostRow};
use quill_types::api::{
    LikesResponse, MessageResponse, PostResponse, PostStatusResponse, SaveResponse, StatusRequest,
};
use quill_types::models::PostStatus;

use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};
use crate::middleware::Session;
use crate::policy;
use crate::state::{AppState, run_db};
use crate::uploads::image_extension;
use crate::views;

/// Trim, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// A `tags` form value is either a JSON array or a comma-separated list.
fn split_tag_value(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    trimmed.split(',').map(str::to_string).collect()
}

pub fn parse_status(raw: &str) -> ApiResult<PostStatus> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid status".into()))
}

fn owner_of(row: &PostRow) -> ApiResult<Uuid> {
    row.author_id
        .parse()
        .map_err(|e| ApiError::internal("Corrupt post record", e))
}

struct CoverUpload {
    data: Bytes,
    extension: &'static str,
}

/// Fields of the create/edit post form. Empty text fields count as absent.
#[derive(Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    status: Option<PostStatus>,
    cover: Option<CoverUpload>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl PostForm {
    async fn read(form: Result<Multipart, MultipartRejection>, max_bytes: usize) -> ApiResult<Self> {
        let mut multipart = form.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let mut parsed = PostForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => parsed.title = non_empty(field.text().await.map_err(multipart_error)?),
                "content" => {
                    parsed.content = non_empty(field.text().await.map_err(multipart_error)?)
                }
                "tags" | "tags[]" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    parsed
                        .tags
                        .get_or_insert_with(Vec::new)
                        .extend(split_tag_value(&value));
                }
                "status" => {
                    if let Some(raw) = non_empty(field.text().await.map_err(multipart_error)?) {
                        parsed.status = Some(parse_status(&raw)?);
                    }
                }
                "coverImage" => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    // browsers send an empty part when no file was picked
                    if data.is_empty() {
                        continue;
                    }
                    if data.len() > max_bytes {
                        return Err(ApiError::PayloadTooLarge);
                    }
                    let extension = image_extension(&content_type).ok_or_else(|| {
                        ApiError::BadRequest("Cover image must be a PNG, JPEG, GIF or WebP".into())
                    })?;
                    parsed.cover = Some(CoverUpload { data, extension });
                }
                other => warn!("Ignoring unknown post form field '{}'", other),
            }
        }

        parsed.tags = parsed.tags.map(normalize_tags);
        Ok(parsed)
    }
}

async fn store_cover(state: &AppState, cover: Option<CoverUpload>) -> ApiResult<Option<String>> {
    match cover {
        Some(cover) => state
            .uploads
            .store(&cover.data, cover.extension)
            .await
            .map(Some)
            .map_err(|e| ApiError::internal("Failed to store cover image", e)),
        None => Ok(None),
    }
}

async fn discard_cover(state: &AppState, stored: Option<&str>) {
    if let Some(path) = stored {
        state.uploads.remove(path).await;
    }
}

pub(crate) async fn load_post(state: &AppState, id: Uuid) -> ApiResult<PostRow> {
    let id = id.to_string();
    run_db(state, move |db| db.get_post(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))
}

/// Apply a patch to a post, cleaning up cover files on both sides.
pub(crate) async fn apply_patch(
    state: &AppState,
    existing: &PostRow,
    patch: PostPatch,
) -> ApiResult<PostRow> {
    let new_cover = patch.cover_image.clone();
    let id = existing.id.clone();
    let result = run_db(state, move |db| db.update_post(&id, &patch)).await;

    let updated = match result {
        Ok(Some(row)) => row,
        Ok(None) => {
            discard_cover(state, new_cover.as_deref()).await;
            return Err(ApiError::not_found("Post"));
        }
        Err(e) => {
            discard_cover(state, new_cover.as_deref()).await;
            return Err(e);
        }
    };

    if let (Some(_), Some(old)) = (&new_cover, &existing.cover_image) {
        state.uploads.remove(old).await;
    }
    Ok(updated)
}

pub(crate) async fn remove_post(state: &AppState, id: Uuid) -> ApiResult<()> {
    let key = id.to_string();
    let deleted = run_db(state, move |db| db.delete_post(&key))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    if let Some(cover) = &deleted.cover_image {
        state.uploads.remove(cover).await;
    }
    info!("Deleted post {}", id);
    Ok(())
}

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<PostResponse>>> {
    let rows = run_db(&state, |db| db.list_posts()).await?;
    Ok(Json(views::posts(rows)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub tags: Option<String>,
}

pub async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let filter = PostFilter {
        query: params.query.and_then(non_empty),
        tags: params
            .tags
            .map(|t| normalize_tags(t.split(',')))
            .unwrap_or_default(),
    };
    let rows = run_db(&state, move |db| db.search_posts(&filter)).await?;
    Ok(Json(views::posts(rows)))
}

pub async fn saved_posts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let user_id = session.user_id.to_string();
    let rows = run_db(&state, move |db| db.list_saved_posts(&user_id)).await?;
    Ok(Json(views::posts(rows)))
}

pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    let row = load_post(&state, id).await?;
    Ok(Json(views::post(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let form = PostForm::read(form, state.uploads.max_bytes()).await?;

    let (Some(title), Some(content)) = (form.title, form.content) else {
        return Err(ApiError::BadRequest("Title and content are required".into()));
    };

    let cover_image = store_cover(&state, form.cover).await?;
    let post = NewPost {
        id: Uuid::new_v4().to_string(),
        author_id: session.user_id.to_string(),
        title,
        content,
        tags: form.tags.unwrap_or_default(),
        cover_image: cover_image.clone(),
        status: form.status.unwrap_or_default(),
    };

    let result = run_db(&state, move |db| {
        db.create_post(&post)?;
        db.get_post(&post.id)
    })
    .await;

    let created = match result {
        Ok(Some(row)) => row,
        Ok(None) => {
            discard_cover(&state, cover_image.as_deref()).await;
            return Err(ApiError::internal(
                "Failed to create post",
                anyhow::anyhow!("post missing after insert"),
            ));
        }
        Err(e) => {
            discard_cover(&state, cover_image.as_deref()).await;
            return Err(e);
        }
    };

    info!("User {} created post {}", session.user_id, created.id);
    Ok((StatusCode::CREATED, Json(views::post(created))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    form: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PostResponse>> {
    let existing = load_post(&state, id).await?;
    policy::ensure_owner_or_admin(&session, owner_of(&existing)?)?;

    let form = PostForm::read(form, state.uploads.max_bytes()).await?;
    let cover_image = store_cover(&state, form.cover).await?;
    let patch = PostPatch {
        title: form.title,
        content: form.content,
        tags: form.tags,
        status: form.status,
        cover_image,
    };

    let updated = apply_patch(&state, &existing, patch).await?;
    Ok(Json(views::post(updated)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let existing = load_post(&state, id).await?;
    policy::ensure_owner_or_admin(&session, owner_of(&existing)?)?;

    remove_post(&state, id).await?;
    Ok(Json(MessageResponse::new("Post deleted")))
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<PostStatusResponse>> {
    let existing = load_post(&state, id).await?;
    policy::ensure_owner_or_admin(&session, owner_of(&existing)?)?;
    let status = parse_status(&req.status)?;

    let key = id.to_string();
    if !run_db(&state, move |db| db.set_post_status(&key, status)).await? {
        return Err(ApiError::not_found("Post"));
    }

    Ok(Json(PostStatusResponse {
        message: "Status updated".into(),
        status,
    }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    let (post_id, user_id) = (id.to_string(), session.user_id.to_string());
    let (_, row) = run_db(&state, move |db| db.toggle_like(&post_id, &user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(views::post(row)))
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    let (post_id, user_id) = (id.to_string(), session.user_id.to_string());
    let row = run_db(&state, move |db| db.like_post(&post_id, &user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(views::post(row)))
}

pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    let (post_id, user_id) = (id.to_string(), session.user_id.to_string());
    let row = run_db(&state, move |db| db.unlike_post(&post_id, &user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(views::post(row)))
}

pub async fn get_likes(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<LikesResponse>> {
    let post_id = id.to_string();
    let likers = run_db(&state, move |db| db.get_likers(&post_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    let users: Vec<Uuid> = likers
        .iter()
        .filter_map(|raw| match raw.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Corrupt liker id '{}' on post {}: {}", raw, id, e);
                None
            }
        })
        .collect();
    Ok(Json(LikesResponse {
        count: users.len(),
        users,
    }))
}

fn save_response(saved: bool) -> Json<SaveResponse> {
    let message = if saved { "Post saved" } else { "Post unsaved" };
    Json(SaveResponse {
        message: message.into(),
        saved,
    })
}

pub async fn toggle_save(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SaveResponse>> {
    let (user_id, post_id) = (session.user_id.to_string(), id.to_string());
    let saved = run_db(&state, move |db| db.toggle_save(&user_id, &post_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(save_response(saved))
}

pub async fn save_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SaveResponse>> {
    let (user_id, post_id) = (session.user_id.to_string(), id.to_string());
    if !run_db(&state, move |db| db.save_post(&user_id, &post_id)).await? {
        return Err(ApiError::not_found("Post"));
    }
    Ok(save_response(true))
}

pub async fn unsave_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SaveResponse>> {
    let (user_id, post_id) = (session.user_id.to_string(), id.to_string());
    if !run_db(&state, move |db| db.unsave_post(&user_id, &post_id)).await? {
        return Err(ApiError::not_found("Post"));
    }
    Ok(save_response(false))
}

pub async fn report_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let post_id = id.to_string();
    if !run_db(&state, move |db| db.set_post_reported(&post_id, true)).await? {
        return Err(ApiError::not_found("Post"));
    }
    info!("User {} reported post {}", session.user_id, id);
    Ok(Json(MessageResponse::new("Post reported")))
}
