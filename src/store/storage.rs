//! SQLite persistence for canvases and their sync status
//!
//! A canvas is stored whole as a JSON definition with its process id, name
//! and revision broken out into indexed columns. Saving is a full replace.

use crate::graph::CanvasSnapshot;
use crate::sync::{HealthSyncStatus, SyncErrorType, SyncState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::collections::HashMap;
use std::path::Path;

/// Give every unsaved edge the next free id of its list
///
/// Ids already present are kept as they are. New ids also start above every id
/// of `previous`, so an id freed by a deleted edge never names another relation.
pub fn assign_edge_ids(snapshot: &mut CanvasSnapshot, previous: Option<&CanvasSnapshot>) {
    fn highest<T>(items: &[T], id: impl Fn(&T) -> Option<i64>) -> i64 {
        items.iter().filter_map(id).max().unwrap_or(0)
    }

    fn fill<T>(items: &mut [T], floor: i64, id: impl Fn(&mut T) -> &mut Option<i64>) {
        let used = items.iter_mut().filter_map(|item| *id(item)).max().unwrap_or(0);
        let mut next = used.max(floor) + 1;
        for item in items.iter_mut() {
            let slot = id(item);
            if slot.is_none() {
                *slot = Some(next);
                next += 1;
            }
        }
    }

    let floors = previous
        .map(|p| {
            [
                highest(&p.edges, |e| e.id),
                highest(&p.step_impl_links, |l| l.id),
                highest(&p.impl_data_links, |l| l.id),
                highest(&p.impl_links, |l| l.id),
            ]
        })
        .unwrap_or_default();

    fill(&mut snapshot.edges, floors[0], |e| &mut e.id);
    fill(&mut snapshot.step_impl_links, floors[1], |l| &mut l.id);
    fill(&mut snapshot.impl_data_links, floors[2], |l| &mut l.id);
    fill(&mut snapshot.impl_links, floors[3], |l| &mut l.id);
}

/// Result of a save attempt against the stored revision
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Persisted with ids assigned and the revision bumped
    Saved(CanvasSnapshot),
    /// The payload was built from an older revision
    Stale { current: Option<i64> },
}

/// Basic canvas metadata for listing operations
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanvasMetadata {
    /// Process the canvas belongs to
    pub process_id: String,
    /// Process display name
    pub name: String,
    /// Revision of the last save
    pub revision: i64,
    /// SQLite timestamp of the last save
    pub updated_at: String,
}

/// SQLite-based canvas storage manager
///
/// One row per process in `canvases`, one per process in `sync_status`.
#[derive(Debug, Clone)]
pub struct CanvasStorage {
    /// SQLite connection pool for the canvas database
    pool: SqlitePool,
}

impl CanvasStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and initialize the schema
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open canvas database at {}", path.display()))?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Private in-memory database, mainly for tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory canvas database")?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and indexes; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS canvases (
                process_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                revision INTEGER NOT NULL,
                definition JSON NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_canvases_name
            ON canvases(name)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_status (
                process_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                last_sync_at TEXT,
                sync_error TEXT,
                error_type TEXT,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace the stored canvas with `snapshot`
    ///
    /// With `reject_stale` set, the payload's revision must match the stored
    /// one (both absent for a new canvas).
    pub async fn save_canvas(
        &self,
        snapshot: &CanvasSnapshot,
        reject_stale: bool,
    ) -> Result<PersistOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT revision, definition FROM canvases WHERE process_id = ?")
            .bind(snapshot.process_id())
            .fetch_optional(&mut *tx)
            .await?;
        let current: Option<i64> = row.as_ref().map(|row| row.get("revision"));
        let previous: Option<CanvasSnapshot> = match row {
            Some(row) => {
                let definition_json: String = row.get("definition");
                match serde_json::from_str(&definition_json) {
                    Ok(previous) => Some(previous),
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Replacing unreadable definition of canvas '{}': {}",
                            snapshot.process_id(),
                            e
                        );
                        None
                    }
                }
            }
            None => None,
        };

        if reject_stale && snapshot.revision != current {
            tracing::warn!(
                "⛔ Stale write to canvas '{}': payload revision {:?}, stored {:?}",
                snapshot.process_id(),
                snapshot.revision,
                current
            );
            return Ok(PersistOutcome::Stale { current });
        }

        let mut stored = snapshot.clone();
        stored.revision = Some(current.unwrap_or(0) + 1);
        assign_edge_ids(&mut stored, previous.as_ref());
        let definition_json = serde_json::to_string(&stored)?;

        sqlx::query(
            r#"
            INSERT INTO canvases (process_id, name, revision, definition, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(process_id) DO UPDATE SET
                name = excluded.name,
                revision = excluded.revision,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(stored.process_id())
        .bind(&stored.process.name)
        .bind(stored.revision)
        .bind(&definition_json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "💽 Stored canvas '{}' at revision {:?}",
            stored.process_id(),
            stored.revision
        );
        Ok(PersistOutcome::Saved(stored))
    }

    pub async fn get_canvas(&self, process_id: &str) -> Result<Option<CanvasSnapshot>> {
        let row = sqlx::query("SELECT definition FROM canvases WHERE process_id = ?")
            .bind(process_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let definition_json: String = row.get("definition");
                let snapshot: CanvasSnapshot = serde_json::from_str(&definition_json)
                    .with_context(|| format!("Corrupt canvas definition for '{}'", process_id))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    pub async fn list_canvases(&self) -> Result<Vec<CanvasMetadata>> {
        let rows = sqlx::query(
            "SELECT process_id, name, revision, CAST(updated_at AS TEXT) AS updated_at FROM canvases ORDER BY updated_at DESC, process_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CanvasMetadata {
                process_id: row.get("process_id"),
                name: row.get("name"),
                revision: row.get("revision"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    /// All canvases keyed by process id, for registry initialization
    pub async fn load_all_canvases(&self) -> Result<HashMap<String, CanvasSnapshot>> {
        let rows = sqlx::query("SELECT process_id, definition FROM canvases")
            .fetch_all(&self.pool)
            .await?;

        let mut canvases = HashMap::new();
        for row in rows {
            let id: String = row.get("process_id");
            let definition_json: String = row.get("definition");
            let snapshot: CanvasSnapshot = serde_json::from_str(&definition_json)
                .with_context(|| format!("Corrupt canvas definition for '{}'", id))?;
            canvases.insert(id, snapshot);
        }

        Ok(canvases)
    }

    /// Current sync status; `never_synced` when nothing was recorded
    pub async fn get_sync_status(&self, process_id: &str) -> Result<HealthSyncStatus> {
        let row = sqlx::query(
            "SELECT status, last_sync_at, sync_error, error_type FROM sync_status WHERE process_id = ?",
        )
        .bind(process_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(HealthSyncStatus::never_synced(process_id));
        };

        let status: String = row.get("status");
        let last_sync_at: Option<String> = row.get("last_sync_at");
        let error_type: Option<String> = row.get("error_type");

        Ok(HealthSyncStatus {
            process_id: process_id.to_string(),
            neo4j_status: SyncState::parse(&status).unwrap_or_default(),
            last_sync_at: last_sync_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
            sync_error: row.get("sync_error"),
            error_type: error_type.as_deref().and_then(SyncErrorType::parse),
        })
    }

    pub async fn set_sync_status(&self, status: &HealthSyncStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_status (process_id, status, last_sync_at, sync_error, error_type, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(process_id) DO UPDATE SET
                status = excluded.status,
                last_sync_at = excluded.last_sync_at,
                sync_error = excluded.sync_error,
                error_type = excluded.error_type,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&status.process_id)
        .bind(status.neo4j_status.as_str())
        .bind(status.last_sync_at.map(|t| t.to_rfc3339()))
        .bind(&status.sync_error)
        .bind(status.error_type.map(SyncErrorType::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
