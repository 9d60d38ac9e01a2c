use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::{CommentAuthor, CommentImageRow, CommentRow, NewComment, UserCommentRow};
use crate::thread::{CommentLink, CommentThread};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use std::collections::HashMap;
use tracing::debug;

const COMMENT_SELECT: &str = "SELECT c.id, c.footprint_id, c.user_id, c.parent_id, c.content, \
                              c.is_deleted, c.created_at, c.updated_at, \
                              u.username, u.nickname, u.avatar \
                              FROM comments c LEFT JOIN users u ON u.id = c.user_id";

impl Database {
    // -- Comments --

    /// Insert a comment and its images in one transaction.
    pub fn create_comment(&self, new: &NewComment) -> Result<CommentRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO comments (footprint_id, user_id, parent_id, content) VALUES (?1, ?2, ?3, ?4)",
                params![new.footprint_id, new.user_id, new.parent_id, new.content],
            )?;
            let id = tx.last_insert_rowid();

            let mut stmt = tx.prepare(
                "INSERT INTO comment_images (comment_id, image_url, description, sort_order)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for image in &new.images {
                stmt.execute(params![id, image.image_url, image.description, image.sort_order])?;
            }

            query_comment(tx, id)?.ok_or_else(|| anyhow!("comment {} vanished after insert", id))
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// A not-deleted comment of `footprint_id`, used to validate reply parents.
    pub fn get_live_comment_in(&self, id: i64, footprint_id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.id = ?1 AND c.footprint_id = ?2 AND c.is_deleted = 0",
                COMMENT_SELECT
            );
            conn.query_row(&sql, params![id, footprint_id], map_comment).optional()
        })
    }

    /// Top-level, not-deleted comments of a footprint, newest first.
    pub fn list_top_level_comments(
        &self,
        footprint_id: i64,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.footprint_id = ?1 AND c.parent_id IS NULL AND c.is_deleted = 0
                 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2 OFFSET ?3",
                COMMENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![footprint_id, limit, skip], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every not-deleted reply of a footprint, oldest first.
    pub fn list_live_replies(&self, footprint_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.footprint_id = ?1 AND c.parent_id IS NOT NULL AND c.is_deleted = 0
                 ORDER BY c.id",
                COMMENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([footprint_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch images for a set of comments, keyed by comment id.
    pub fn get_comment_images(&self, comment_ids: &[i64]) -> Result<HashMap<i64, Vec<CommentImageRow>>> {
        if comment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, comment_id, image_url, description, sort_order, created_at
                 FROM comment_images WHERE comment_id IN ({}) ORDER BY comment_id, sort_order, id",
                placeholders(comment_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(comment_ids.iter()), |row| {
                Ok(CommentImageRow {
                    id: row.get(0)?,
                    comment_id: row.get(1)?,
                    image_url: row.get(2)?,
                    description: row.get(3)?,
                    sort_order: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;

            let mut grouped: HashMap<i64, Vec<CommentImageRow>> = HashMap::new();
            for image in rows {
                let image = image?;
                grouped.entry(image.comment_id).or_default().push(image);
            }
            Ok(grouped)
        })
    }

    /// Not-deleted comments written by `user_id`, newest first, each with
    /// the footprint it was left on.
    pub fn list_user_comments(&self, user_id: i64, skip: u32, limit: u32) -> Result<Vec<UserCommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.footprint_id, c.user_id, c.parent_id, c.content,
                        c.is_deleted, c.created_at, c.updated_at,
                        u.username, u.nickname, u.avatar,
                        f.name, f.lng, f.lat
                 FROM comments c
                 LEFT JOIN users u ON u.id = c.user_id
                 JOIN footprints f ON f.id = c.footprint_id
                 WHERE c.user_id = ?1 AND c.is_deleted = 0
                 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit, skip], |row| {
                    Ok(UserCommentRow {
                        comment: map_comment(row)?,
                        footprint_name: row.get(11)?,
                        footprint_lng: row.get(12)?,
                        footprint_lat: row.get(13)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Soft-delete `comment_id` and every descendant reachable through
    /// comments that are not deleted yet. Returns the number of rows marked.
    pub fn cascade_soft_delete(&self, comment_id: i64) -> Result<usize> {
        self.with_tx(|tx| {
            let footprint_id: Option<i64> = tx
                .query_row(
                    "SELECT footprint_id FROM comments WHERE id = ?1",
                    [comment_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(footprint_id) = footprint_id else {
                return Ok(0);
            };

            let thread = CommentThread::build(load_links(tx, footprint_id)?);
            let targets = thread.cascade_targets(comment_id);
            if targets.is_empty() {
                return Ok(0);
            }

            let sql = format!(
                "UPDATE comments SET is_deleted = 1, updated_at = datetime('now') WHERE id IN ({})",
                placeholders(targets.len())
            );
            let marked = tx.execute(&sql, rusqlite::params_from_iter(targets.iter()))?;
            debug!(
                "Cancelled comment {} of footprint {} ({} rows)",
                comment_id, footprint_id, marked
            );
            Ok(marked)
        })
    }

    pub fn count_comments(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM comments WHERE is_deleted = 0", [], |r| {
                r.get(0)
            })?)
        })
    }
}

fn load_links(conn: &Connection, footprint_id: i64) -> Result<Vec<CommentLink>> {
    let mut stmt =
        conn.prepare("SELECT id, parent_id, is_deleted FROM comments WHERE footprint_id = ?1")?;
    let links = stmt
        .query_map([footprint_id], |row| {
            Ok(CommentLink {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                is_deleted: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<CommentRow>> {
    let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
    conn.query_row(&sql, [id], map_comment).optional()
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    let username: Option<String> = row.get(8)?;
    Ok(CommentRow {
        id: row.get(0)?,
        footprint_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_id: row.get(3)?,
        content: row.get(4)?,
        is_deleted: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        author: match username {
            Some(username) => Some(CommentAuthor {
                username,
                nickname: row.get(9)?,
                avatar: row.get(10)?,
            }),
            None => None,
        },
    })
}
