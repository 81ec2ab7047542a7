//! v001 -- Initial schema creation.
//!
//! A single `collections` table: one row per named collection, holding the
//! whole collection as a JSON document.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name       TEXT PRIMARY KEY NOT NULL,   -- "users", "groups", "messages"
    body       TEXT NOT NULL,               -- JSON document
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
