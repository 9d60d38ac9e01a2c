use super::OptionalExt;
use crate::Database;
use crate::models::{ProfileChanges, Registration, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, email, password_hash, nickname, avatar, bio, gender, \
                            status, is_admin, created_at, updated_at, last_login";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![username, email, password_hash, is_admin],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    /// Self-service sign-up. The uniqueness checks and the insert share one
    /// transaction, so concurrent sign-ups for the same name cannot both pass.
    pub fn register_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Registration> {
        self.with_tx(|tx| {
            if exists(tx, "SELECT 1 FROM users WHERE username = ?1", username)? {
                return Ok(Registration::UsernameTaken);
            }
            if exists(tx, "SELECT 1 FROM users WHERE email = ?1", email)? {
                return Ok(Registration::EmailTaken);
            }

            tx.execute(
                "INSERT INTO users (username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, 0)",
                rusqlite::params![username, email, password_hash],
            )?;
            let id = tx.last_insert_rowid();
            let row = query_user(tx, "id = ?1", &id)?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))?;
            Ok(Registration::Created(row))
        })
    }

    pub fn record_login(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = datetime('now') WHERE id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }

    pub fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![password_hash, user_id],
            )?;
            Ok(())
        })
    }

    /// Apply the fields present in `changes`; absent ones keep their value.
    pub fn update_profile(&self, user_id: i64, changes: &ProfileChanges) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    nickname = COALESCE(?1, nickname),
                    bio = COALESCE(?2, bio),
                    gender = COALESCE(?3, gender),
                    avatar = COALESCE(?4, avatar),
                    updated_at = datetime('now')
                 WHERE id = ?5",
                rusqlite::params![
                    changes.nickname,
                    changes.bio,
                    changes.gender,
                    changes.avatar,
                    user_id
                ],
            )?;
            Ok(())
        })
    }

    /// Newest accounts first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users ORDER BY id DESC", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when no such user exists.
    pub fn set_user_status(&self, user_id: i64, status: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![status, user_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::types::ToSql,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate);
    conn.query_row(&sql, [value], map_user).optional()
}

fn exists(conn: &Connection, sql: &str, value: &str) -> Result<bool> {
    Ok(conn.query_row(sql, [value], |_| Ok(())).optional()?.is_some())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        nickname: row.get(4)?,
        avatar: row.get(5)?,
        bio: row.get(6)?,
        gender: row.get(7)?,
        status: row.get(8)?,
        is_admin: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        last_login: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db, user};
    use crate::models::{ProfileChanges, Registration};

    #[test]
    fn create_and_lookup() {
        let db = db();
        let id = user(&db, "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.email, "alice@example.com");
        assert!(by_name.is_active());
        assert!(!by_name.is_admin);
        assert!(by_name.last_login.is_none());

        assert!(db.get_user_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn registration_reports_which_field_is_taken() {
        let db = db();
        user(&db, "alice");

        assert!(matches!(
            db.register_user("alice", "new@example.com", "h").unwrap(),
            Registration::UsernameTaken
        ));
        assert!(matches!(
            db.register_user("bob", "alice@example.com", "h").unwrap(),
            Registration::EmailTaken
        ));

        match db.register_user("bob", "bob@example.com", "h").unwrap() {
            Registration::Created(row) => {
                assert_eq!(row.username, "bob");
                assert!(!row.is_admin);
                assert!(row.is_active());
            }
            other => panic!("expected a new user, got {:?}", other),
        }
        assert!(matches!(
            db.register_user("bob", "bob2@example.com", "h").unwrap(),
            Registration::UsernameTaken
        ));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        user(&db, "alice");
        assert!(db.create_user("alice", "other@example.com", "h", false).is_err());
    }

    #[test]
    fn profile_update_keeps_absent_fields() {
        let db = db();
        let id = user(&db, "alice");

        db.update_profile(
            id,
            &ProfileChanges {
                nickname: Some("Ali".into()),
                bio: Some("hi".into()),
                ..Default::default()
            },
        )
        .unwrap();
        db.update_profile(
            id,
            &ProfileChanges {
                gender: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.nickname.as_deref(), Some("Ali"));
        assert_eq!(row.bio.as_deref(), Some("hi"));
        assert_eq!(row.gender, 2);
    }

    #[test]
    fn status_and_login() {
        let db = db();
        let id = user(&db, "alice");

        assert!(db.set_user_status(id, 0).unwrap());
        assert!(!db.get_user_by_id(id).unwrap().unwrap().is_active());
        assert!(!db.set_user_status(999, 0).unwrap());

        db.record_login(id).unwrap();
        assert!(db.get_user_by_id(id).unwrap().unwrap().last_login.is_some());
    }
}
