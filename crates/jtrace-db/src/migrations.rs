use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Footprint types created on first start: (name, icon, sort_order).
pub const DEFAULT_FOOTPRINT_TYPES: &[(&str, &str, i64)] = &[
    ("Food", "/icons/food.svg", 1),
    ("Attraction", "/icons/attraction.svg", 2),
    ("Nature", "/icons/nature.svg", 3),
    ("Museum", "/icons/museum.svg", 4),
    ("Shopping", "/icons/shopping.svg", 5),
    ("Other", "/icons/default.svg", 6),
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                nickname        TEXT,
                avatar          TEXT,
                bio             TEXT,
                gender          INTEGER NOT NULL DEFAULT 0,
                status          INTEGER NOT NULL DEFAULT 1,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                last_login      TEXT
            );

            CREATE TABLE footprint_types (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                icon        TEXT,
                sort_order  INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE footprints (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                lng         REAL NOT NULL,
                lat         REAL NOT NULL,
                type        TEXT NOT NULL DEFAULT 'other',
                date        TEXT,
                notes       TEXT,
                is_public   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_footprints_user ON footprints(user_id);
            CREATE INDEX idx_footprints_public ON footprints(is_public, created_at);

            CREATE TABLE tags (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE footprint_tags (
                footprint_id    INTEGER NOT NULL REFERENCES footprints(id) ON DELETE CASCADE,
                tag_id          INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (footprint_id, tag_id)
            );

            CREATE TABLE footprint_medias (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                footprint_id    INTEGER NOT NULL REFERENCES footprints(id) ON DELETE CASCADE,
                media_url       TEXT NOT NULL,
                media_type      TEXT NOT NULL,
                description     TEXT,
                sort_order      INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_medias_footprint ON footprint_medias(footprint_id);

            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                footprint_id    INTEGER NOT NULL REFERENCES footprints(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                parent_id       INTEGER REFERENCES comments(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                is_deleted      INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_footprint ON comments(footprint_id, created_at);
            CREATE INDEX idx_comments_parent ON comments(parent_id);
            CREATE INDEX idx_comments_user ON comments(user_id);

            CREATE TABLE comment_images (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                image_url   TEXT NOT NULL,
                description TEXT,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comment_images_comment ON comment_images(comment_id);

            CREATE TABLE op_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER,
                action      TEXT NOT NULL,
                path        TEXT NOT NULL,
                method      TEXT NOT NULL,
                detail      TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    for (name, icon, sort_order) in DEFAULT_FOOTPRINT_TYPES {
        conn.execute(
            "INSERT OR IGNORE INTO footprint_types (name, icon, sort_order) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, icon, sort_order],
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let types: i64 = conn
            .query_row("SELECT COUNT(*) FROM footprint_types", [], |r| r.get(0))
            .unwrap();
        assert_eq!(types, DEFAULT_FOOTPRINT_TYPES.len() as i64);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
