use crate::models::{Analytics, NewUser, TagRow, TagWrite, UserRow};
use crate::{Database, OptionalExt, now};
use anyhow::{Result, anyhow};
use quill_types::models::Role;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, name, email, password, role, blocked, avatar, bio, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<()> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO users (id, name, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (&user.id, &user.name, &user.email, &user.password_hash, &ts),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                [email],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Patch profile fields; `None` keeps the stored value.
    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET name = COALESCE(?2, name),
                     avatar = COALESCE(?3, avatar),
                     bio = COALESCE(?4, bio),
                     updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![id, name, avatar, bio, now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                (id, password_hash, now()),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_user_blocked(&self, id: &str, blocked: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET blocked = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, blocked, now()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Flip the blocked flag in one transaction.
    /// Returns the new value, or `None` if the user does not exist.
    pub fn toggle_user_blocked(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: Option<bool> = tx
                .query_row("SELECT blocked FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            let Some(current) = current else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE users SET blocked = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, !current, now()],
            )?;
            tx.commit()?;
            Ok(Some(!current))
        })
    }

    pub fn set_user_role(&self, id: &str, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                (id, role.as_str(), now()),
            )?;
            Ok(changed > 0)
        })
    }

    /// Swap user <-> admin in one transaction.
    /// Returns the new role, or `None` if the user does not exist.
    pub fn toggle_user_role(&self, id: &str) -> Result<Option<Role>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row("SELECT role FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            let Some(current) = current else {
                return Ok(None);
            };

            let next = current
                .parse::<Role>()
                .map_err(|e| anyhow!("user {}: {}", id, e))?
                .flipped();

            tx.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                (id, next.as_str(), now()),
            )?;
            tx.commit()?;
            Ok(Some(next))
        })
    }

    /// Promote an existing account to admin. Returns false if no user has
    /// that email.
    pub fn promote_by_email(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = 'admin', updated_at = ?2 WHERE email = ?1",
                (email, now()),
            )?;
            Ok(changed > 0)
        })
    }

    /// Hard delete. Posts, comments, likes and saves owned by the user go
    /// with it through ON DELETE CASCADE.
    /// Delete a user; their posts, comments, likes and saves cascade.
    /// Returns the cover image paths of the removed posts, read in the same
    /// transaction so a post created concurrently cannot slip past, or
    /// `None` if the user does not exist.
    pub fn delete_user(&self, id: &str) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let covers = {
                let mut stmt = tx.prepare(
                    "SELECT cover_image FROM posts WHERE author_id = ?1 AND cover_image IS NOT NULL",
                )?;
                stmt.query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            if tx.execute("DELETE FROM users WHERE id = ?1", [id])? == 0 {
                return Ok(None);
            }
            tx.commit()?;
            Ok(Some(covers))
        })
    }

    // -- Tags --

    pub fn create_tag(&self, id: &str, name: &str) -> Result<TagWrite> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)",
                (id, name, now()),
            )?;
            if inserted == 0 {
                return Ok(TagWrite::Duplicate);
            }
            match query_tag(conn, id)? {
                Some(tag) => Ok(TagWrite::Written(tag)),
                None => Ok(TagWrite::Missing),
            }
        })
    }

    pub fn get_tag(&self, id: &str) -> Result<Option<TagRow>> {
        self.with_conn(|conn| query_tag(conn, id))
    }

    pub fn list_tags(&self) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, created_at FROM tags ORDER BY name")?;
            let rows = stmt
                .query_map([], map_tag)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Rename a tag and every post's reference to it.
    pub fn rename_tag(&self, id: &str, name: &str) -> Result<TagWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(old) = query_tag(&tx, id)? else {
                return Ok(TagWrite::Missing);
            };
            if old.name == name {
                return Ok(TagWrite::Written(old));
            }

            let taken: Option<String> = tx
                .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))
                .optional()?;
            if taken.is_some() {
                return Ok(TagWrite::Duplicate);
            }

            tx.execute("UPDATE tags SET name = ?2 WHERE id = ?1", (id, name))?;
            // A post already carrying the new name keeps a single entry.
            tx.execute(
                "UPDATE OR IGNORE post_tags SET tag = ?2 WHERE tag = ?1",
                (&old.name, name),
            )?;
            tx.execute("DELETE FROM post_tags WHERE tag = ?1", [&old.name])?;

            let renamed = query_tag(&tx, id)?;
            tx.commit()?;
            Ok(renamed.map_or(TagWrite::Missing, TagWrite::Written))
        })
    }

    /// Delete a tag and strip its name from every post.
    pub fn delete_tag(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(tag) = query_tag(&tx, id)? else {
                return Ok(false);
            };

            tx.execute("DELETE FROM post_tags WHERE tag = ?1", [&tag.name])?;
            tx.execute("DELETE FROM tags WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Analytics --

    pub fn analytics(&self) -> Result<Analytics> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

            Ok(Analytics {
                total_users: count("SELECT COUNT(*) FROM users")?,
                total_posts: count("SELECT COUNT(*) FROM posts")?,
                total_comments: count("SELECT COUNT(*) FROM comments")?,
                total_likes: count("SELECT COUNT(*) FROM post_likes")?,
            })
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        blocked: row.get(5)?,
        avatar: row.get(6)?,
        bio: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        map_user,
    )
    .optional()
}

fn map_tag(row: &Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn query_tag(conn: &Connection, id: &str) -> Result<Option<TagRow>> {
    conn.query_row("SELECT id, name, created_at FROM tags WHERE id = ?1", [id], map_tag)
        .optional()
}

#[cfg(test)]
mod tests {
    use crate::models::{NewPost, TagWrite};
    use crate::test_support::{db, user};
    use quill_types::models::{PostStatus, Role};

    fn post_with_tags(db: &crate::Database, author: &str, tags: &[&str]) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_post(&NewPost {
            id: id.clone(),
            author_id: author.to_string(),
            title: "t".into(),
            content: "c".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            cover_image: None,
            status: PostStatus::Draft,
        })
        .unwrap();
        id
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = db();
        user(&db, "Ada");
        let err = db
            .create_user(&crate::models::NewUser {
                id: "other".into(),
                name: "Ada Again".into(),
                email: "ada@example.com".into(),
                password_hash: "x".into(),
            })
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn profile_patch_keeps_unspecified_fields() {
        let db = db();
        let id = user(&db, "Ada");
        db.update_profile(&id, None, Some("a.png"), Some("hi")).unwrap();
        let row = db.update_profile(&id, Some("Ada L"), None, None).unwrap().unwrap();
        assert_eq!(row.name, "Ada L");
        assert_eq!(row.avatar.as_deref(), Some("a.png"));
        assert_eq!(row.bio.as_deref(), Some("hi"));
    }

    #[test]
    fn toggles_flip_and_report_missing_users() {
        let db = db();
        let id = user(&db, "Ada");

        assert_eq!(db.toggle_user_blocked(&id).unwrap(), Some(true));
        assert_eq!(db.toggle_user_blocked(&id).unwrap(), Some(false));
        assert_eq!(db.toggle_user_role(&id).unwrap(), Some(Role::Admin));
        assert_eq!(db.toggle_user_role(&id).unwrap(), Some(Role::User));

        assert_eq!(db.toggle_user_blocked("nope").unwrap(), None);
        assert_eq!(db.toggle_user_role("nope").unwrap(), None);
    }

    #[test]
    fn deleting_a_user_cascades_to_their_content() {
        let db = db();
        let author = user(&db, "Ada");
        let reader = user(&db, "Bob");
        let post = post_with_tags(&db, &author, &["rust"]);
        db.like_post(&post, &reader).unwrap();

        assert_eq!(db.delete_user(&author).unwrap(), Some(vec![]));
        assert!(db.get_post(&post).unwrap().is_none());
        assert_eq!(db.analytics().unwrap().total_likes, 0);
        assert_eq!(db.delete_user(&author).unwrap(), None);
    }

    #[test]
    fn deleting_a_user_hands_back_only_their_cover_images() {
        let db = db();
        let ann = user(&db, "Ann");
        let bob = user(&db, "Bob");
        let covered = |author: &str, cover: &str| {
            db.create_post(&NewPost {
                id: uuid::Uuid::new_v4().to_string(),
                author_id: author.to_string(),
                title: "covered".into(),
                content: "c".into(),
                tags: vec![],
                cover_image: Some(cover.into()),
                status: PostStatus::Published,
            })
            .unwrap();
        };
        covered(&ann, "/uploads/a.png");
        covered(&bob, "/uploads/b.png");
        post_with_tags(&db, &ann, &[]);

        assert_eq!(db.delete_user(&ann).unwrap(), Some(vec!["/uploads/a.png".to_string()]));
        assert_eq!(db.list_posts().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_tag_names_are_reported() {
        let db = db();
        assert!(matches!(db.create_tag("t1", "tech").unwrap(), TagWrite::Written(_)));
        assert!(matches!(db.create_tag("t2", "tech").unwrap(), TagWrite::Duplicate));
        assert_eq!(db.list_tags().unwrap().len(), 1);
    }

    #[test]
    fn deleting_a_tag_strips_it_from_posts() {
        let db = db();
        let author = user(&db, "Ada");
        db.create_tag("t1", "tech").unwrap();
        let post = post_with_tags(&db, &author, &["tech", "life"]);

        assert!(db.delete_tag("t1").unwrap());
        assert_eq!(db.get_post(&post).unwrap().unwrap().tags, vec!["life"]);
        assert!(db.list_tags().unwrap().is_empty());
        assert!(!db.delete_tag("t1").unwrap());
    }

    #[test]
    fn renaming_a_tag_follows_into_posts() {
        let db = db();
        let author = user(&db, "Ada");
        db.create_tag("t1", "tech").unwrap();
        db.create_tag("t2", "life").unwrap();
        let plain = post_with_tags(&db, &author, &["tech"]);
        let both = post_with_tags(&db, &author, &["tech", "technology"]);

        assert!(matches!(db.rename_tag("t1", "life").unwrap(), TagWrite::Duplicate));
        assert!(matches!(db.rename_tag("t1", "technology").unwrap(), TagWrite::Written(_)));
        assert!(matches!(db.rename_tag("nope", "x").unwrap(), TagWrite::Missing));

        assert_eq!(db.get_post(&plain).unwrap().unwrap().tags, vec!["technology"]);
        assert_eq!(db.get_post(&both).unwrap().unwrap().tags, vec!["technology"]);
    }

    #[test]
    fn analytics_counts_every_entity() {
        let db = db();
        let a = user(&db, "Ada");
        let b = user(&db, "Bob");
        let p1 = post_with_tags(&db, &a, &[]);
        let p2 = post_with_tags(&db, &b, &[]);
        db.like_post(&p1, &a).unwrap();
        db.like_post(&p1, &b).unwrap();
        db.like_post(&p2, &a).unwrap();
        db.create_comment(&crate::models::NewComment {
            id: "c1".into(),
            post_id: p1.clone(),
            author_id: b.clone(),
            content: "nice".into(),
        })
        .unwrap();

        let stats = db.analytics().unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.total_comments, 1);
        assert_eq!(stats.total_likes, 3);
    }
}
