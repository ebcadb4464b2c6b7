//! Capture Store Module
//!
//! SQLite-backed durable storage for the two engine collections:
//! pending captures and identification history. The store owns a single
//! connection behind a mutex; every operation acquires the guard, runs
//! one statement or transaction, and releases on every exit path. The
//! mutex also makes the store the single physical writer, so concurrent
//! call paths (an enqueue landing mid-drain) cannot corrupt the file.

pub mod migrations;

mod models;
pub use models::*;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{CaptureId, CoreError, CoreResult};

// =============================================================================
// Capture Store
// =============================================================================

/// Durable store for pending captures and history records.
pub struct CaptureStore {
    conn: Mutex<Connection>,
}

impl CaptureStore {
    /// Opens (or creates) the store at the given path and brings the
    /// schema up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CoreError::StorageUnavailable(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            CoreError::StorageUnavailable(format!("Failed to open capture store: {}", e))
        })?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::StorageUnavailable(format!("Failed to create in-memory store: {}", e))
        })?;

        Self::from_connection(conn)
    }

    /// Default on-disk location: `{data_dir}/plantfinder/captures.db`.
    pub fn default_path() -> std::path::PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("plantfinder")
            .join("captures.db")
    }

    fn from_connection(mut conn: Connection) -> CoreResult<Self> {
        migrations::run(&mut conn).map_err(|e| {
            CoreError::StorageUnavailable(format!("Failed to upgrade capture store: {}", e))
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // =========================================================================
    // Pending collection
    // =========================================================================

    /// Inserts or overwrites a pending capture by id.
    pub fn put_pending(&self, capture: &PendingCapture) -> CoreResult<()> {
        self.lock()
            .execute(
                "INSERT OR REPLACE INTO pending_captures (id, image_data, created_at, lat, lng)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    capture.id,
                    capture.image_data,
                    capture.created_at,
                    capture.location.map(|l| l.lat),
                    capture.location.map(|l| l.lng),
                ],
            )
            .map_err(|e| CoreError::StorageFailed(format!("Failed to persist capture: {}", e)))?;

        Ok(())
    }

    /// Returns all pending captures oldest first: `created_at` ascending,
    /// same-millisecond ties broken by insertion order.
    pub fn all_pending(&self) -> CoreResult<Vec<PendingCapture>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, image_data, created_at, lat, lng
                 FROM pending_captures ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| CoreError::StorageFailed(format!("Failed to query queue: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PendingCapture {
                    id: row.get(0)?,
                    image_data: row.get(1)?,
                    created_at: row.get(2)?,
                    location: geo_from_row(row.get(3)?, row.get(4)?),
                })
            })
            .map_err(|e| CoreError::StorageFailed(format!("Failed to read queue: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::StorageFailed(format!("Failed to read queue row: {}", e)))
    }

    /// Deletes a pending capture; absent ids are a no-op.
    pub fn delete_pending(&self, id: &CaptureId) -> CoreResult<()> {
        self.lock()
            .execute("DELETE FROM pending_captures WHERE id = ?1", params![id])
            .map_err(|e| CoreError::StorageFailed(format!("Failed to delete capture: {}", e)))?;

        Ok(())
    }

    /// Current pending-queue size, derived from storage.
    pub fn count_pending(&self) -> CoreResult<usize> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM pending_captures", [], |row| row.get(0))
            .map_err(|e| CoreError::StorageFailed(format!("Failed to count queue: {}", e)))?;

        Ok(count as usize)
    }

    // =========================================================================
    // History collection
    // =========================================================================

    /// Appends a history record. Ids never repeat, so a plain insert.
    pub fn put_history(&self, record: &HistoryRecord) -> CoreResult<()> {
        self.lock()
            .execute(
                "INSERT INTO history_records (id, subject_id, image_data, created_at, lat, lng)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.subject_id,
                    record.image_data,
                    record.created_at,
                    record.location.map(|l| l.lat),
                    record.location.map(|l| l.lng),
                ],
            )
            .map_err(|e| CoreError::StorageFailed(format!("Failed to persist record: {}", e)))?;

        Ok(())
    }

    /// Returns all history records newest first: `created_at` descending,
    /// same-millisecond ties broken by reverse append order.
    pub fn all_history(&self) -> CoreResult<Vec<HistoryRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, subject_id, image_data, created_at, lat, lng
                 FROM history_records ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| CoreError::StorageFailed(format!("Failed to query history: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(HistoryRecord {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    image_data: row.get(2)?,
                    created_at: row.get(3)?,
                    location: geo_from_row(row.get(4)?, row.get(5)?),
                })
            })
            .map_err(|e| CoreError::StorageFailed(format!("Failed to read history: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::StorageFailed(format!("Failed to read history row: {}", e)))
    }

    /// Looks up a single history record by id.
    pub fn get_history(&self, id: &str) -> CoreResult<Option<HistoryRecord>> {
        self.lock()
            .query_row(
                "SELECT id, subject_id, image_data, created_at, lat, lng
                 FROM history_records WHERE id = ?1",
                params![id],
                |row| {
                    Ok(HistoryRecord {
                        id: row.get(0)?,
                        subject_id: row.get(1)?,
                        image_data: row.get(2)?,
                        created_at: row.get(3)?,
                        location: geo_from_row(row.get(4)?, row.get(5)?),
                    })
                },
            )
            .optional()
            .map_err(|e| CoreError::StorageFailed(format!("Failed to read record: {}", e)))
    }
}

fn geo_from_row(lat: Option<f64>, lng: Option<f64>) -> Option<crate::core::GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(crate::core::GeoPoint::new(lat, lng)),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
