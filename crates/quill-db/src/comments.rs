use crate::models::{CommentRow, NewComment};
use crate::{Database, OptionalExt, now};
use anyhow::Result;
use quill_types::models::CommentStatus;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.author_id, u.name, u.email, c.post_id, p.title,
            c.status, c.reported, c.created_at, c.updated_at
     FROM comments c
     LEFT JOIN users u ON c.author_id = u.id
     LEFT JOIN posts p ON c.post_id = p.id";

const NEWEST_FIRST: &str = "ORDER BY c.created_at DESC, c.rowid DESC";

impl Database {
    /// Insert a pending comment. Returns `None` if the post does not exist.
    pub fn create_comment(&self, comment: &NewComment) -> Result<Option<CommentRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let post_exists = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [&comment.post_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !post_exists {
                return Ok(None);
            }

            let ts = now();
            tx.execute(
                "INSERT INTO comments (id, content, author_id, post_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    comment.id,
                    comment.content,
                    comment.author_id,
                    comment.post_id,
                    CommentStatus::Pending.as_str(),
                    ts
                ],
            )?;
            let row = query_comment(&tx, &comment.id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    pub fn list_comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            query_comments(
                conn,
                &format!("{COMMENT_SELECT} WHERE c.post_id = ?1 {NEWEST_FIRST}"),
                &[&post_id],
            )
        })
    }

    /// Every comment, or only those written by `author_id` when given.
    pub fn list_comments(&self, author_id: Option<&str>) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| match author_id {
            Some(author_id) => query_comments(
                conn,
                &format!("{COMMENT_SELECT} WHERE c.author_id = ?1 {NEWEST_FIRST}"),
                &[&author_id],
            ),
            None => query_comments(conn, &format!("{COMMENT_SELECT} {NEWEST_FIRST}"), &[]),
        })
    }

    pub fn list_reported_comments(&self) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            query_comments(
                conn,
                &format!("{COMMENT_SELECT} WHERE c.reported = 1 {NEWEST_FIRST}"),
                &[],
            )
        })
    }

    pub fn update_comment_content(&self, id: &str, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                (id, content, now()),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    pub fn set_comment_status(&self, id: &str, status: CommentStatus) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET status = ?2, updated_at = ?3 WHERE id = ?1",
                (id, status.as_str(), now()),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    pub fn set_comment_reported(&self, id: &str, reported: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET reported = ?2 WHERE id = ?1",
                rusqlite::params![id, reported],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        author_email: row.get(4)?,
        post_id: row.get(5)?,
        post_title: row.get(6)?,
        status: row.get(7)?,
        reported: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn query_comment(conn: &Connection, id: &str) -> Result<Option<CommentRow>> {
    conn.query_row(&format!("{COMMENT_SELECT} WHERE c.id = ?1"), [id], map_comment)
        .optional()
}

fn query_comments(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<CommentRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_comment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
