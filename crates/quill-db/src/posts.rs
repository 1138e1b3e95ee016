use std::collections::HashMap;

use crate::models::{NewPost, PostFilter, PostPatch, PostRow};
use crate::{Database, OptionalExt, now};
use anyhow::Result;
use quill_types::models::PostStatus;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

// JOIN users to fetch author name in a single query
const POST_SELECT: &str = "SELECT p.id, p.title, p.content, p.author_id, u.name, p.cover_image,
            p.status, p.reported, p.created_at, p.updated_at
     FROM posts p
     LEFT JOIN users u ON p.author_id = u.id";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.rowid DESC";

impl Database {
    pub fn create_post(&self, post: &NewPost) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO posts (id, title, content, author_id, cover_image, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    post.id,
                    post.title,
                    post.content,
                    post.author_id,
                    post.cover_image,
                    post.status.as_str(),
                    ts
                ],
            )?;
            write_tags(&tx, &post.id, &post.tags)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let rows = query_posts(conn, &format!("{POST_SELECT} {NEWEST_FIRST}"), &[])?;
            attach_relations(conn, rows)
        })
    }

    pub fn list_reported_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let rows = query_posts(
                conn,
                &format!("{POST_SELECT} WHERE p.reported = 1 {NEWEST_FIRST}"),
                &[],
            )?;
            attach_relations(conn, rows)
        })
    }

    /// Tag filtering happens in SQL; the text match runs here so it can use
    /// Unicode-aware lowercasing, which SQLite's `lower()` lacks.
    pub fn search_posts(&self, filter: &PostFilter) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let rows = if filter.tags.is_empty() {
                query_posts(conn, &format!("{POST_SELECT} {NEWEST_FIRST}"), &[])?
            } else {
                let sql = format!(
                    "{POST_SELECT}
                     WHERE EXISTS (
                         SELECT 1 FROM post_tags t
                         WHERE t.post_id = p.id AND t.tag IN (SELECT value FROM json_each(?1))
                     )
                     {NEWEST_FIRST}"
                );
                let tags = serde_json::to_string(&filter.tags)?;
                query_posts(conn, &sql, &[&tags])?
            };

            let rows = match filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
                Some(query) => {
                    let needle = query.to_lowercase();
                    rows.into_iter()
                        .filter(|row| matches_text(row, &needle))
                        .collect()
                }
                None => rows,
            };

            attach_relations(conn, rows)
        })
    }

    /// Apply a patch in one transaction. Returns the updated post, or `None`
    /// if it does not exist.
    pub fn update_post(&self, id: &str, patch: &PostPatch) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE posts
                 SET title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     status = COALESCE(?4, status),
                     cover_image = COALESCE(?5, cover_image),
                     updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.title,
                    patch.content,
                    patch.status.map(|s| s.as_str()),
                    patch.cover_image,
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            if let Some(tags) = &patch.tags {
                tx.execute("DELETE FROM post_tags WHERE post_id = ?1", [id])?;
                write_tags(&tx, id, tags)?;
            }
            let post = query_post(&tx, id)?;
            tx.commit()?;
            Ok(post)
        })
    }

    pub fn set_post_status(&self, id: &str, status: PostStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = ?2, updated_at = ?3 WHERE id = ?1",
                (id, status.as_str(), now()),
            )?;
            Ok(changed > 0)
        })
    }

    /// Full replace of a post's tag list.
    pub fn replace_post_tags(&self, id: &str, tags: &[String]) -> Result<Option<PostRow>> {
        self.update_post(
            id,
            &PostPatch {
                tags: Some(tags.to_vec()),
                ..PostPatch::default()
            },
        )
    }

    pub fn set_post_reported(&self, id: &str, reported: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET reported = ?2 WHERE id = ?1",
                rusqlite::params![id, reported],
            )?;
            Ok(changed > 0)
        })
    }

    /// Comments, likes, saves and tags go with the post through ON DELETE
    /// CASCADE. Returns the removed row so the caller can drop its cover image.
    pub fn delete_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(post) = query_post(&tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(Some(post))
        })
    }

    // -- Likes --

    /// Idempotent like. Returns the updated post, or `None` if it does not exist.
    pub fn like_post(&self, post_id: &str, user_id: &str) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(None);
            }
            tx.execute(
                "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (post_id, user_id, now()),
            )?;
            let post = query_post(&tx, post_id)?;
            tx.commit()?;
            Ok(post)
        })
    }

    /// Idempotent unlike. Returns the updated post, or `None` if it does not exist.
    pub fn unlike_post(&self, post_id: &str, user_id: &str) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(None);
            }
            tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                (post_id, user_id),
            )?;
            let post = query_post(&tx, post_id)?;
            tx.commit()?;
            Ok(post)
        })
    }

    /// Toggle a like: removes if present, inserts if not. The check and the
    /// write share one transaction, so concurrent toggles serialize.
    /// Returns (liked, post) or `None` if the post does not exist.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<Option<(bool, PostRow)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(None);
            }
            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                (post_id, user_id),
            )?;
            let liked = removed == 0;
            if liked {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    (post_id, user_id, now()),
                )?;
            }
            let post = query_post(&tx, post_id)?;
            tx.commit()?;
            Ok(post.map(|p| (liked, p)))
        })
    }

    pub fn get_likers(&self, post_id: &str) -> Result<Option<Vec<String>>> {
        self.with_conn(|conn| {
            if !post_exists(conn, post_id)? {
                return Ok(None);
            }
            let mut stmt = conn.prepare(
                "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY created_at, rowid",
            )?;
            let ids = stmt
                .query_map([post_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(ids))
        })
    }

    // -- Saves --

    /// Idempotent save. Returns false if the post does not exist.
    pub fn save_post(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            if !post_exists(conn, post_id)? {
                return Ok(false);
            }
            conn.execute(
                "INSERT OR IGNORE INTO saved_posts (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
                (user_id, post_id, now()),
            )?;
            Ok(true)
        })
    }

    /// Idempotent unsave. Returns false if the post does not exist.
    pub fn unsave_post(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            if !post_exists(conn, post_id)? {
                return Ok(false);
            }
            conn.execute(
                "DELETE FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
                (user_id, post_id),
            )?;
            Ok(true)
        })
    }

    /// Returns the new saved state, or `None` if the post does not exist.
    pub fn toggle_save(&self, user_id: &str, post_id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, post_id)? {
                return Ok(None);
            }
            let removed = tx.execute(
                "DELETE FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
                (user_id, post_id),
            )?;
            let saved = removed == 0;
            if saved {
                tx.execute(
                    "INSERT INTO saved_posts (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
                    (user_id, post_id, now()),
                )?;
            }
            tx.commit()?;
            Ok(Some(saved))
        })
    }

    /// The user's saved posts, most recently saved first.
    pub fn list_saved_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT}
                 JOIN saved_posts s ON s.post_id = p.id
                 WHERE s.user_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let rows = query_posts(conn, &sql, &[&user_id])?;
            attach_relations(conn, rows)
        })
    }
}

fn matches_text(row: &PostRow, needle: &str) -> bool {
    row.title.to_lowercase().contains(needle) || row.content.to_lowercase().contains(needle)
}

fn post_exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn write_tags(conn: &Connection, post_id: &str, tags: &[String]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO post_tags (post_id, position, tag) VALUES (?1, ?2, ?3)")?;
    for (position, tag) in tags.iter().enumerate() {
        stmt.execute(rusqlite::params![post_id, position as i64, tag])?;
    }
    Ok(())
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row.get(4)?,
        cover_image: row.get(5)?,
        status: row.get(6)?,
        reported: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        tags: Vec::new(),
        likes: Vec::new(),
        saved_by: Vec::new(),
    })
}

fn query_posts(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let row = conn
        .query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [id], map_post)
        .optional()?;
    match row {
        Some(row) => Ok(attach_relations(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

/// Batch-fetch tags, likers and savers for a set of posts (one query each
/// rather than three per post). The ids travel as one JSON array parameter,
/// so the query does not grow with the listing.
fn attach_relations(conn: &Connection, mut rows: Vec<PostRow>) -> Result<Vec<PostRow>> {
    if rows.is_empty() {
        return Ok(rows);
    }

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let ids = serde_json::to_string(&ids)?;
    let tags = group_by_post(
        conn,
        "SELECT post_id, tag FROM post_tags
         WHERE post_id IN (SELECT value FROM json_each(?1)) ORDER BY position",
        &ids,
    )?;
    let likes = group_by_post(
        conn,
        "SELECT post_id, user_id FROM post_likes
         WHERE post_id IN (SELECT value FROM json_each(?1)) ORDER BY created_at, rowid",
        &ids,
    )?;
    let saves = group_by_post(
        conn,
        "SELECT post_id, user_id FROM saved_posts
         WHERE post_id IN (SELECT value FROM json_each(?1)) ORDER BY created_at, rowid",
        &ids,
    )?;

    for row in &mut rows {
        row.tags = tags.get(&row.id).cloned().unwrap_or_default();
        row.likes = likes.get(&row.id).cloned().unwrap_or_default();
        row.saved_by = saves.get(&row.id).cloned().unwrap_or_default();
    }
    Ok(rows)
}

/// `post_ids` is a JSON array bound to `?1`.
fn group_by_post(
    conn: &Connection,
    sql: &str,
    post_ids: &str,
) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(sql)?;

    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    let pairs = stmt.query_map([post_ids], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for pair in pairs {
        let (post_id, value) = pair?;
        grouped.entry(post_id).or_default().push(value);
    }
    Ok(grouped)
}
