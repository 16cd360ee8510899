//! Binding registry backed by SQLite
//!
//! One table, `bind_list`, with a `UNIQUE` constraint on `game_id`. Inserts
//! run the quota count and the insert inside a single `BEGIN IMMEDIATE`
//! transaction, so concurrent binds for the same game ID or the same owner
//! cannot both pass validation.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use whitelist_core::{Binding, BindingId, GameId, Result, WhitelistError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, game_id, owner_id, owner_name, created_at FROM bind_list";

/// Persistent mapping of game IDs to chat identities
#[derive(Clone)]
pub struct BindingRegistry {
    pool: Arc<Pool<SqliteConnectionManager>>,
    max_bindings_per_owner: usize,
}

impl BindingRegistry {
    /// Open (or create) a file-backed registry
    pub fn open(path: &Path, max_bindings_per_owner: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    WhitelistError::Storage(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| storage("Failed to create connection pool", e))?;

        info!("Opened binding registry at {}", path.display());
        Self::with_pool(pool, max_bindings_per_owner)
    }

    /// In-memory registry; a single pooled connection keeps one database
    pub fn open_in_memory(max_bindings_per_owner: usize) -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| storage("Failed to create connection pool", e))?;
        Self::with_pool(pool, max_bindings_per_owner)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>, max_bindings_per_owner: usize) -> Result<Self> {
        let conn = pool
            .get()
            .map_err(|e| storage("Failed to get connection", e))?;
        init_schema(&conn)?;
        Ok(Self {
            pool: Arc::new(pool),
            max_bindings_per_owner,
        })
    }

    pub fn max_bindings_per_owner(&self) -> usize {
        self.max_bindings_per_owner
    }

    pub async fn find_by_game_id(&self, game_id: &GameId) -> Result<Option<Binding>> {
        let game_id = game_id.as_str().to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE game_id = ?1", SELECT_COLUMNS),
                rusqlite::params![game_id],
                read_row,
            )
            .optional()
            .map_err(|e| storage("Failed to look up game ID", e))?
            .map(parse_binding_row)
            .transpose()
        })
        .await
    }

    /// Bindings held by one owner, in creation order
    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Binding>> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("{} WHERE owner_id = ?1 ORDER BY id ASC", SELECT_COLUMNS))
                .map_err(|e| storage("Failed to prepare owner query", e))?;
            let rows = stmt
                .query_map(rusqlite::params![owner_id], read_row)
                .map_err(|e| storage("Failed to query bindings", e))?;

            let mut bindings = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| storage("Failed to read binding row", e))?;
                bindings.push(parse_binding_row(raw)?);
            }
            Ok(bindings)
        })
        .await
    }

    pub async fn find_by_id(&self, id: BindingId) -> Result<Option<Binding>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                rusqlite::params![id as i64],
                read_row,
            )
            .optional()
            .map_err(|e| storage("Failed to look up binding id", e))?
            .map(parse_binding_row)
            .transpose()
        })
        .await
    }

    /// Insert a binding after checking uniqueness and the owner's quota
    ///
    /// Fails with `DuplicateGameId` when the game ID is taken (including a
    /// lost race, detected by the unique constraint) and `QuotaExceeded` when
    /// the owner already holds the maximum.
    pub async fn insert(
        &self,
        game_id: &GameId,
        owner_id: &str,
        owner_display_name: &str,
    ) -> Result<Binding> {
        let game_id = game_id.clone();
        let owner_id = owner_id.to_string();
        let owner_display_name = owner_display_name.to_string();
        let max = self.max_bindings_per_owner;

        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| storage("Failed to begin transaction", e))?;

            let taken: Option<i64> = tx
                .query_row(
                    "SELECT id FROM bind_list WHERE game_id = ?1",
                    rusqlite::params![game_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| storage("Failed to check game ID", e))?;
            if taken.is_some() {
                return Err(WhitelistError::DuplicateGameId(game_id.to_string()));
            }

            let owned: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM bind_list WHERE owner_id = ?1",
                    rusqlite::params![owner_id],
                    |row| row.get(0),
                )
                .map_err(|e| storage("Failed to count bindings", e))?;
            if owned as usize >= max {
                return Err(WhitelistError::QuotaExceeded {
                    owner: owner_id,
                    max,
                });
            }

            let created_at = Utc::now();
            tx.execute(
                "INSERT INTO bind_list (game_id, owner_id, owner_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    game_id.as_str(),
                    owner_id,
                    owner_display_name,
                    created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    WhitelistError::DuplicateGameId(game_id.to_string())
                }
                other => storage("Failed to insert binding", other),
            })?;
            let id = tx.last_insert_rowid() as BindingId;

            tx.commit()
                .map_err(|e| storage("Failed to commit binding", e))?;

            debug!("Inserted binding #{} {} -> {}", id, game_id, owner_id);
            Ok(Binding {
                id,
                game_id,
                owner_id,
                owner_display_name,
                created_at,
            })
        })
        .await
    }

    pub async fn delete_by_game_id(&self, game_id: &GameId) -> Result<()> {
        let key = game_id.as_str().to_string();
        let deleted = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM bind_list WHERE game_id = ?1", rusqlite::params![key])
                    .map_err(|e| storage("Failed to delete binding", e))
            })
            .await?;
        if deleted == 0 {
            return Err(WhitelistError::NotFound(game_id.to_string()));
        }
        Ok(())
    }

    pub async fn delete_by_id(&self, id: BindingId) -> Result<()> {
        let deleted = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM bind_list WHERE id = ?1", rusqlite::params![id as i64])
                    .map_err(|e| storage("Failed to delete binding", e))
            })
            .await?;
        if deleted == 0 {
            return Err(WhitelistError::NotFound(format!("#{}", id)));
        }
        Ok(())
    }

    /// Number of live bindings
    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM bind_list", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| storage("Failed to count bindings", e))
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| storage("Failed to get connection", e))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| storage("Task join error", e))?
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bind_list (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id TEXT NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            owner_name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bind_list_owner_id ON bind_list(owner_id);",
    )
    .map_err(|e| storage("Failed to create bind_list table", e))
}

fn storage(context: &str, err: impl std::fmt::Display) -> WhitelistError {
    WhitelistError::Storage(format!("{}: {}", context, err))
}

struct RawBindingRow {
    id: i64,
    game_id: String,
    owner_id: String,
    owner_name: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBindingRow> {
    Ok(RawBindingRow {
        id: row.get(0)?,
        game_id: row.get(1)?,
        owner_id: row.get(2)?,
        owner_name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn parse_binding_row(raw: RawBindingRow) -> Result<Binding> {
    let game_id = GameId::parse(&raw.game_id)
        .map_err(|e| storage(&format!("Corrupt game ID in row #{}", raw.id), e))?;
    let created_at = DateTime::parse_from_rfc3339(&raw.created_at)
        .map_err(|e| storage(&format!("Corrupt created_at in row #{}", raw.id), e))?
        .with_timezone(&Utc);

    Ok(Binding {
        id: raw.id as BindingId,
        game_id,
        owner_id: raw.owner_id,
        owner_display_name: raw.owner_name,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitelist_core::ErrorKind;

    fn gid(raw: &str) -> GameId {
        GameId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let registry = BindingRegistry::open_in_memory(3).unwrap();
        let binding = registry.insert(&gid("Steve"), "10001", "alice").await.unwrap();
        assert_eq!(binding.owner_id, "10001");

        let found = registry.find_by_game_id(&gid("Steve")).await.unwrap().unwrap();
        assert_eq!(found, binding);
        assert_eq!(registry.find_by_id(binding.id).await.unwrap(), Some(binding));
        assert!(registry.find_by_game_id(&gid("steve")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_game_id_rejected() {
        let registry = BindingRegistry::open_in_memory(3).unwrap();
        registry.insert(&gid("Steve"), "10001", "alice").await.unwrap();

        let err = registry.insert(&gid("Steve"), "10002", "bob").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateGameId);
        assert_eq!(registry.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let registry = BindingRegistry::open_in_memory(2).unwrap();
        registry.insert(&gid("One"), "10001", "alice").await.unwrap();
        registry.insert(&gid("Two"), "10001", "alice").await.unwrap();

        let err = registry.insert(&gid("Three"), "10001", "alice").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);

        // Other owners are unaffected
        registry.insert(&gid("Three"), "10002", "bob").await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_owner_in_creation_order() {
        let registry = BindingRegistry::open_in_memory(3).unwrap();
        for name in ["Zed", "Amy", "Max"] {
            registry.insert(&gid(name), "10001", "alice").await.unwrap();
        }
        let names: Vec<String> = registry
            .find_by_owner("10001")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.game_id.to_string())
            .collect();
        assert_eq!(names, vec!["Zed", "Amy", "Max"]);
    }

    #[tokio::test]
    async fn test_delete_and_ids_not_reused() {
        let registry = BindingRegistry::open_in_memory(3).unwrap();
        let first = registry.insert(&gid("Steve"), "10001", "alice").await.unwrap();
        registry.delete_by_game_id(&gid("Steve")).await.unwrap();

        let err = registry.delete_by_game_id(&gid("Steve")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = registry.delete_by_id(first.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let second = registry.insert(&gid("Steve"), "10001", "alice").await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_single_winner_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BindingRegistry::open(&dir.path().join("nested/whitelist.db"), 3).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .insert(&GameId::parse("Contested").unwrap(), &format!("owner{}", i), "n")
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::DuplicateGameId),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(registry.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_respect_quota() {
        let registry = BindingRegistry::open_in_memory(2).unwrap();

        let mut handles = Vec::new();
        for i in 0..6 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .insert(&GameId::parse(&format!("Alt{}", i)).unwrap(), "10001", "alice")
                    .await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }
        assert_eq!(registry.find_by_owner("10001").await.unwrap().len(), 2);
    }
}
