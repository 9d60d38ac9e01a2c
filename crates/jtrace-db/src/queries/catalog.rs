use super::OptionalExt;
use crate::Database;
use crate::models::FootprintTypeRow;
use anyhow::Result;
use rusqlite::{Row, params};

impl Database {
    // -- Footprint types --

    pub fn list_footprint_types(&self) -> Result<Vec<FootprintTypeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, icon, sort_order FROM footprint_types ORDER BY sort_order, id",
            )?;
            let rows = stmt
                .query_map([], map_type)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_footprint_type(&self, id: i64) -> Result<Option<FootprintTypeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, icon, sort_order FROM footprint_types WHERE id = ?1",
                [id],
                map_type,
            )
            .optional()
        })
    }

    /// Whether a type other than `except` already uses `name`.
    pub fn footprint_type_name_taken(&self, name: &str, except: Option<i64>) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT id FROM footprint_types WHERE name = ?1 AND id != COALESCE(?2, -1)",
                    params![name, except],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn create_footprint_type(
        &self,
        name: &str,
        icon: Option<&str>,
        sort_order: i64,
    ) -> Result<FootprintTypeRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO footprint_types (name, icon, sort_order) VALUES (?1, ?2, ?3)",
                params![name, icon, sort_order],
            )?;
            Ok(FootprintTypeRow {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                icon: icon.map(str::to_string),
                sort_order,
            })
        })
    }

    /// Returns false when no such type exists.
    pub fn update_footprint_type(
        &self,
        id: i64,
        name: &str,
        icon: Option<&str>,
        sort_order: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE footprint_types SET name = ?1, icon = ?2, sort_order = ?3 WHERE id = ?4",
                params![name, icon, sort_order, id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_footprint_type(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM footprint_types WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn map_type(row: &Row<'_>) -> rusqlite::Result<FootprintTypeRow> {
    Ok(FootprintTypeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        sort_order: row.get(3)?,
    })
}
