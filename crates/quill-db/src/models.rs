//! Database row types. These map directly to SQLite rows and stay distinct
//! from the quill-types API models to keep the DB layer independent.

use quill_types::models::PostStatus;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub blocked: bool,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A post with its tag list and liker/saver sets attached.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    /// `None` only if the author row is gone.
    pub author_name: Option<String>,
    pub cover_image: Option<String>,
    pub status: String,
    pub reported: bool,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<String>,
    pub likes: Vec<String>,
    pub saved_by: Vec<String>,
}

pub struct NewPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub status: PostStatus,
}

/// Partial post update. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct PostFilter {
    /// Case-insensitive substring matched against title or content.
    pub query: Option<String>,
    /// Matches posts carrying any of these tags. Empty means no tag filter.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub post_id: String,
    pub post_title: Option<String>,
    pub status: String,
    pub reported: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct TagRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analytics {
    pub total_users: i64,
    pub total_posts: i64,
    pub total_comments: i64,
    pub total_likes: i64,
}

/// Outcome of a tag create/rename against the unique name constraint.
#[derive(Debug)]
pub enum TagWrite {
    Written(TagRow),
    Duplicate,
    Missing,
}
