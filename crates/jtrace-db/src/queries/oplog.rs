use crate::Database;
use crate::models::{OpLogRow, StatsRow};
use anyhow::Result;
use rusqlite::{Connection, params};

impl Database {
    // -- Audit log --

    pub fn insert_oplog(
        &self,
        user_id: Option<i64>,
        action: &str,
        path: &str,
        method: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO op_logs (user_id, action, path, method, detail) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, action, path, method, detail],
            )?;
            Ok(())
        })
    }

    /// Most recent entries first.
    pub fn list_oplogs(&self, limit: u32) -> Result<Vec<OpLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, action, path, method, detail, created_at
                 FROM op_logs ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(OpLogRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        action: row.get(2)?,
                        path: row.get(3)?,
                        method: row.get(4)?,
                        detail: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            Ok(StatsRow {
                users: count(conn, "SELECT COUNT(*) FROM users")?,
                active_users: count(conn, "SELECT COUNT(*) FROM users WHERE status = 1")?,
                footprints: count(conn, "SELECT COUNT(*) FROM footprints")?,
                public_footprints: count(conn, "SELECT COUNT(*) FROM footprints WHERE is_public = 1")?,
                comments: count(conn, "SELECT COUNT(*) FROM comments WHERE is_deleted = 0")?,
                medias: count(conn, "SELECT COUNT(*) FROM footprint_medias")?,
                op_logs: count(conn, "SELECT COUNT(*) FROM op_logs")?,
            })
        })
    }
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db, user};

    #[test]
    fn logs_are_listed_newest_first_and_limited() {
        let db = db();
        let alice = user(&db, "alice");
        db.insert_oplog(Some(alice), "REQUEST", "/api/footprints", "GET", None)
            .unwrap();
        db.insert_oplog(None, "REQUEST", "/api/health", "GET", Some("status=200"))
            .unwrap();

        let logs = db.list_oplogs(1).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].path, "/api/health");
        assert!(logs[0].user_id.is_none());
        assert_eq!(db.list_oplogs(1000).unwrap().len(), 2);
    }

    #[test]
    fn stats_count_rows() {
        let db = db();
        let alice = user(&db, "alice");
        user(&db, "bob");
        db.set_user_status(alice, 0).unwrap();
        db.insert_oplog(None, "REQUEST", "/api/health", "GET", None)
            .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.footprints, 0);
        assert_eq!(stats.op_logs, 1);
    }
}
