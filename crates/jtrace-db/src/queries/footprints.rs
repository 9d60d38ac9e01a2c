use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::{FootprintChanges, FootprintRow, MediaRow, NewFootprint, NewMedia};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::HashMap;

const FOOTPRINT_SELECT: &str = "SELECT f.id, f.user_id, u.username, f.name, f.lng, f.lat, f.type, \
                                f.date, f.notes, f.is_public, f.created_at \
                                FROM footprints f JOIN users u ON u.id = f.user_id";

impl Database {
    // -- Footprints --

    /// Insert a footprint with its tags and media in one transaction.
    pub fn create_footprint(&self, new: &NewFootprint) -> Result<FootprintRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO footprints (user_id, name, lng, lat, type, date, notes, is_public)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.user_id,
                    new.name,
                    new.lng,
                    new.lat,
                    new.kind,
                    new.date,
                    new.notes,
                    new.is_public
                ],
            )?;
            let id = tx.last_insert_rowid();

            link_tags(tx, id, &new.tags)?;
            insert_medias(tx, id, &new.medias)?;

            query_one(tx, "f.id = ?1", params![id])?
                .ok_or_else(|| anyhow::anyhow!("footprint {} vanished after insert", id))
        })
    }

    /// The footprint if `user_id` owns it.
    pub fn get_owned_footprint(&self, id: i64, user_id: i64) -> Result<Option<FootprintRow>> {
        self.with_conn(|conn| query_one(conn, "f.id = ?1 AND f.user_id = ?2", params![id, user_id]))
    }

    /// The footprint if `user_id` owns it or it is public.
    pub fn get_visible_footprint(&self, id: i64, user_id: i64) -> Result<Option<FootprintRow>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                "f.id = ?1 AND (f.user_id = ?2 OR f.is_public = 1)",
                params![id, user_id],
            )
        })
    }

    pub fn list_user_footprints(&self, user_id: i64) -> Result<Vec<FootprintRow>> {
        self.with_conn(|conn| {
            query_many(
                conn,
                "f.user_id = ?1 ORDER BY f.created_at DESC, f.id DESC",
                params![user_id],
            )
        })
    }

    pub fn list_public_footprints(&self, skip: u32, limit: u32) -> Result<Vec<FootprintRow>> {
        self.with_conn(|conn| {
            query_many(
                conn,
                "f.is_public = 1 ORDER BY f.created_at DESC, f.id DESC LIMIT ?1 OFFSET ?2",
                params![limit, skip],
            )
        })
    }

    /// Apply `changes` to a footprint owned by `user_id`. Tags and media are
    /// replaced wholesale when present. Returns `None` when not owned.
    pub fn update_footprint(
        &self,
        id: i64,
        user_id: i64,
        changes: &FootprintChanges,
    ) -> Result<Option<FootprintRow>> {
        self.with_tx(|tx| {
            let owned = tx
                .query_row(
                    "SELECT 1 FROM footprints WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                    |_| Ok(()),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(None);
            }

            tx.execute(
                "UPDATE footprints SET
                    name = COALESCE(?1, name),
                    lng = COALESCE(?2, lng),
                    lat = COALESCE(?3, lat),
                    type = COALESCE(?4, type),
                    notes = COALESCE(?5, notes),
                    is_public = COALESCE(?6, is_public)
                 WHERE id = ?7",
                params![
                    changes.name,
                    changes.lng,
                    changes.lat,
                    changes.kind,
                    changes.notes,
                    changes.is_public,
                    id
                ],
            )?;

            if let Some(date) = &changes.date {
                tx.execute("UPDATE footprints SET date = ?1 WHERE id = ?2", params![date, id])?;
            }

            if let Some(tags) = &changes.tags {
                tx.execute("DELETE FROM footprint_tags WHERE footprint_id = ?1", [id])?;
                link_tags(tx, id, tags)?;
            }

            if let Some(medias) = &changes.medias {
                tx.execute("DELETE FROM footprint_medias WHERE footprint_id = ?1", [id])?;
                insert_medias(tx, id, medias)?;
            }

            query_one(tx, "f.id = ?1", params![id])
        })
    }

    /// Delete a footprint owned by `user_id`; tags links, media rows and
    /// comments go with it. Files on disk are left alone.
    pub fn delete_footprint(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM footprints WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn count_footprints_of_type(&self, kind: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM footprints WHERE type = ?1",
                [kind],
                |row| row.get(0),
            )?)
        })
    }
}

fn link_tags(conn: &Connection, footprint_id: i64, tags: &[String]) -> Result<()> {
    let mut position = 0i64;
    for name in tags {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
        let tag_id: i64 = conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |r| r.get(0))?;
        let linked = conn.execute(
            "INSERT OR IGNORE INTO footprint_tags (footprint_id, tag_id, position) VALUES (?1, ?2, ?3)",
            params![footprint_id, tag_id, position],
        )?;
        position += linked as i64;
    }
    Ok(())
}

fn insert_medias(conn: &Connection, footprint_id: i64, medias: &[NewMedia]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO footprint_medias (footprint_id, media_url, media_type, description, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for media in medias {
        stmt.execute(params![
            footprint_id,
            media.media_url,
            media.media_type,
            media.description,
            media.sort_order
        ])?;
    }
    Ok(())
}

fn query_one(
    conn: &Connection,
    predicate: &str,
    params: impl rusqlite::Params,
) -> Result<Option<FootprintRow>> {
    let sql = format!("{} WHERE {}", FOOTPRINT_SELECT, predicate);
    let Some(row) = conn.query_row(&sql, params, map_footprint).optional()? else {
        return Ok(None);
    };
    let mut rows = vec![row];
    hydrate(conn, &mut rows)?;
    Ok(rows.pop())
}

fn query_many(
    conn: &Connection,
    predicate: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<FootprintRow>> {
    let sql = format!("{} WHERE {}", FOOTPRINT_SELECT, predicate);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params, map_footprint)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    hydrate(conn, &mut rows)?;
    Ok(rows)
}

/// Batch-fetch tags and media for a set of footprints.
fn hydrate(conn: &Connection, rows: &mut [FootprintRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let list = placeholders(ids.len());

    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    let sql = format!(
        "SELECT ft.footprint_id, t.name FROM footprint_tags ft JOIN tags t ON t.id = ft.tag_id
         WHERE ft.footprint_id IN ({}) ORDER BY ft.footprint_id, ft.position",
        list
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut cursor = stmt.query(rusqlite::params_from_iter(ids.iter()))?;
    while let Some(row) = cursor.next()? {
        tags.entry(row.get(0)?).or_default().push(row.get(1)?);
    }

    let mut medias: HashMap<i64, Vec<MediaRow>> = HashMap::new();
    let sql = format!(
        "SELECT id, footprint_id, media_url, media_type, description, sort_order, created_at
         FROM footprint_medias WHERE footprint_id IN ({}) ORDER BY footprint_id, sort_order, id",
        list
    );
    let mut stmt = conn.prepare(&sql)?;
    let media_rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
        Ok(MediaRow {
            id: row.get(0)?,
            footprint_id: row.get(1)?,
            media_url: row.get(2)?,
            media_type: row.get(3)?,
            description: row.get(4)?,
            sort_order: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    for media in media_rows {
        let media = media?;
        medias.entry(media.footprint_id).or_default().push(media);
    }

    for row in rows.iter_mut() {
        row.tags = tags.remove(&row.id).unwrap_or_default();
        row.medias = medias.remove(&row.id).unwrap_or_default();
    }
    Ok(())
}

fn map_footprint(row: &Row<'_>) -> rusqlite::Result<FootprintRow> {
    Ok(FootprintRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        lng: row.get(4)?,
        lat: row.get(5)?,
        kind: row.get(6)?,
        date: row.get(7)?,
        notes: row.get(8)?,
        is_public: row.get(9)?,
        created_at: row.get(10)?,
        tags: Vec::new(),
        medias: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db, user};
    use crate::models::{FootprintChanges, NewFootprint, NewMedia};

    fn new_footprint(user_id: i64, name: &str, is_public: bool) -> NewFootprint {
        NewFootprint {
            user_id,
            name: name.into(),
            lng: 116.39,
            lat: 39.9,
            kind: "Food".into(),
            date: Some("2024-09-22".into()),
            notes: None,
            is_public,
            tags: vec!["beijing".into(), "duck".into(), "beijing".into()],
            medias: vec![NewMedia {
                media_url: "uploads/images/a.jpg".into(),
                media_type: "image".into(),
                description: Some("front".into()),
                sort_order: 0,
            }],
        }
    }

    #[test]
    fn create_stores_tags_and_media() {
        let db = db();
        let alice = user(&db, "alice");

        let row = db.create_footprint(&new_footprint(alice, "Quanjude", false)).unwrap();
        assert_eq!(row.username.as_deref(), Some("alice"));
        assert_eq!(row.tags, vec!["beijing", "duck"]);
        assert_eq!(row.medias.len(), 1);
        assert_eq!(row.medias[0].media_url, "uploads/images/a.jpg");
        assert_eq!(row.date.as_deref(), Some("2024-09-22"));
    }

    #[test]
    fn visibility_rules() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let private = db.create_footprint(&new_footprint(alice, "home", false)).unwrap();
        let public = db.create_footprint(&new_footprint(alice, "park", true)).unwrap();

        assert!(db.get_owned_footprint(private.id, alice).unwrap().is_some());
        assert!(db.get_owned_footprint(private.id, bob).unwrap().is_none());
        assert!(db.get_visible_footprint(private.id, bob).unwrap().is_none());
        assert!(db.get_visible_footprint(public.id, bob).unwrap().is_some());

        let listed = db.list_public_footprints(0, 20).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public.id);
        assert_eq!(db.list_user_footprints(alice).unwrap().len(), 2);
        assert!(db.list_user_footprints(bob).unwrap().is_empty());
    }

    #[test]
    fn public_listing_is_newest_first_and_paged() {
        let db = db();
        let alice = user(&db, "alice");
        let ids: Vec<i64> = (0..3)
            .map(|i| db.create_footprint(&new_footprint(alice, &format!("p{}", i), true)).unwrap().id)
            .collect();

        let page = db.list_public_footprints(0, 2).unwrap();
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
        let rest = db.list_public_footprints(2, 2).unwrap();
        assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[test]
    fn update_replaces_tags_and_media_only_when_given() {
        let db = db();
        let alice = user(&db, "alice");
        let row = db.create_footprint(&new_footprint(alice, "old", false)).unwrap();

        let updated = db
            .update_footprint(
                row.id,
                alice,
                &FootprintChanges {
                    name: Some("new".into()),
                    is_public: Some(true),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "new");
        assert!(updated.is_public);
        assert_eq!(updated.tags, vec!["beijing", "duck"]);
        assert_eq!(updated.medias.len(), 1);

        let updated = db
            .update_footprint(
                row.id,
                alice,
                &FootprintChanges {
                    date: Some(None),
                    tags: Some(vec!["x".into()]),
                    medias: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "new");
        assert!(updated.date.is_none());
        assert_eq!(updated.tags, vec!["x"]);
        assert!(updated.medias.is_empty());
    }

    #[test]
    fn only_owner_can_update_or_delete() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let row = db.create_footprint(&new_footprint(alice, "home", true)).unwrap();

        assert!(
            db.update_footprint(row.id, bob, &FootprintChanges::default())
                .unwrap()
                .is_none()
        );
        assert!(!db.delete_footprint(row.id, bob).unwrap());

        assert!(db.delete_footprint(row.id, alice).unwrap());
        assert!(db.get_owned_footprint(row.id, alice).unwrap().is_none());
        let medias: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM footprint_medias", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(medias, 0);
    }

    #[test]
    fn failed_insert_rolls_back() {
        let db = db();
        // Unknown owner violates the foreign key; nothing may remain.
        assert!(db.create_footprint(&new_footprint(999, "ghost", true)).is_err());
        assert!(db.list_public_footprints(0, 20).unwrap().is_empty());

        let tags: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(tags, 0);
    }

    #[test]
    fn type_usage_is_counted() {
        let db = db();
        let alice = user(&db, "alice");
        db.create_footprint(&new_footprint(alice, "a", false)).unwrap();
        assert_eq!(db.count_footprints_of_type("Food").unwrap(), 1);
        assert_eq!(db.count_footprints_of_type("Nature").unwrap(), 0);
    }
}
