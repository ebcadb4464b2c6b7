//! Capture Store Migrations
//!
//! Ordered, additive schema migrations tracked through SQLite's
//! `user_version` pragma. Each entry upgrades the schema by exactly one
//! version; upgrades never drop or rewrite rows in existing collections,
//! so a v1 installation keeps its queued captures when the history
//! collection is introduced in v2.

use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // V1: pending capture queue
    "CREATE TABLE IF NOT EXISTS pending_captures (
        id TEXT PRIMARY KEY,
        image_data BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        lat REAL,
        lng REAL
    );
    CREATE INDEX IF NOT EXISTS idx_pending_created ON pending_captures(created_at);",
    // V2: identification history
    "CREATE TABLE IF NOT EXISTS history_records (
        id TEXT PRIMARY KEY,
        subject_id TEXT,
        image_data BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        lat REAL,
        lng REAL
    );
    CREATE INDEX IF NOT EXISTS idx_history_created ON history_records(created_at);",
];

/// Latest schema version.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Applies any migrations newer than the database's recorded version.
pub fn run(conn: &mut Connection) -> rusqlite::Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let target = idx as i64 + 1;
        if target <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;

        tracing::info!("Applied capture store migration v{}", target);
    }

    Ok(())
}
