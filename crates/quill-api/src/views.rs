//! Row -> response conversion. Corrupt stored values are logged and
//! replaced with defaults rather than failing the whole listing.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use quill_db::models::{CommentRow, PostRow, TagRow, UserRow};
use quill_types::api::{
    AuthorSummary, CommentAuthor, CommentPost, CommentResponse, PostResponse, TagResponse,
    UserResponse,
};

fn uuid(field: &str, raw: &str, owner: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on '{}': {}", field, raw, owner, e);
        Uuid::default()
    })
}

fn enum_or_default<T: std::str::FromStr + Default>(field: &str, raw: &str, owner: &str) -> T
where
    T::Err: std::fmt::Display,
{
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on '{}': {}", field, raw, owner, e);
        T::default()
    })
}

pub fn timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') form, naive UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user(row: &UserRow) -> UserResponse {
    UserResponse {
        id: uuid("user id", &row.id, &row.id),
        name: row.name.clone(),
        email: row.email.clone(),
        role: row.role.parse().unwrap_or_else(|e| {
            warn!("Corrupt role on user '{}': {}", row.id, e);
            quill_types::models::Role::User
        }),
        blocked: row.blocked,
        avatar: row.avatar.clone(),
        bio: row.bio.clone(),
        created_at: timestamp(&row.created_at),
    }
}

pub fn post(row: PostRow) -> PostResponse {
    let id = uuid("post id", &row.id, &row.id);
    PostResponse {
        author: AuthorSummary {
            id: uuid("author_id", &row.author_id, &row.id),
            name: row.author_name.unwrap_or_else(|| "unknown".to_string()),
        },
        status: enum_or_default("status", &row.status, &row.id),
        likes: row.likes.iter().map(|u| uuid("liker", u, &row.id)).collect(),
        saved_by: row.saved_by.iter().map(|u| uuid("saver", u, &row.id)).collect(),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
        id,
        title: row.title,
        content: row.content,
        tags: row.tags,
        cover_image: row.cover_image,
        reported: row.reported,
    }
}

pub fn posts(rows: Vec<PostRow>) -> Vec<PostResponse> {
    rows.into_iter().map(post).collect()
}

pub fn comment(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: uuid("comment id", &row.id, &row.id),
        author: CommentAuthor {
            id: uuid("author_id", &row.author_id, &row.id),
            name: row.author_name.unwrap_or_else(|| "unknown".to_string()),
            email: row.author_email,
        },
        post: CommentPost {
            id: uuid("post_id", &row.post_id, &row.id),
            title: row.post_title,
        },
        status: enum_or_default("status", &row.status, &row.id),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
        content: row.content,
        reported: row.reported,
    }
}

pub fn comments(rows: Vec<CommentRow>) -> Vec<CommentResponse> {
    rows.into_iter().map(comment).collect()
}

pub fn tag(row: &TagRow) -> TagResponse {
    TagResponse {
        id: uuid("tag id", &row.id, &row.id),
        name: row.name.clone(),
        created_at: timestamp(&row.created_at),
    }
}
