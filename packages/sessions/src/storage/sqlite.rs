use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{validate_id, SessionStore, StorageError, StorageResult};
use crate::state::{checkpoint_id_prefix, is_checkpoint_id_of, CheckpointSummary, SessionState};

/// SQLite implementation of SessionStore
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database file at `path`
    pub async fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let database_url = format!("sqlite:{}", path.display());

        if !sqlx::Sqlite::database_exists(&database_url).await? {
            debug!("Creating database at: {}", database_url);
            sqlx::Sqlite::create_database(&database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&database_url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> StorageResult<Self> {
        // Every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn initialize(&self) -> StorageResult<()> {
        info!("Initializing SQLite session store with migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;

        Ok(())
    }

    async fn save(&self, state: &SessionState) -> StorageResult<()> {
        validate_id(&state.session_id)?;
        let document = serde_json::to_string(state)?;

        sqlx::query(
            r#"
            INSERT INTO session_documents (id, user_id, checkpoint_name, document, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                checkpoint_name = excluded.checkpoint_name,
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.session_id)
        .bind(&state.user_id)
        .bind(&state.checkpoint_name)
        .bind(&document)
        .bind(state.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved session document {}", state.session_id);
        Ok(())
    }

    async fn load(&self, id: &str) -> StorageResult<Option<SessionState>> {
        validate_id(id)?;

        let row = sqlx::query("SELECT document FROM session_documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: String = row.try_get("document")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    async fn list_checkpoints(&self, session_id: &str) -> StorageResult<Vec<CheckpointSummary>> {
        validate_id(session_id)?;
        let prefix = checkpoint_id_prefix(session_id);

        // substr instead of LIKE: ids contain '_', which LIKE treats as a wildcard
        let rows = sqlx::query(
            r#"
            SELECT document FROM session_documents
            WHERE checkpoint_name IS NOT NULL AND substr(id, 1, length(?1)) = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let document: String = row.try_get("document")?;
            match serde_json::from_str::<SessionState>(&document) {
                Ok(state) if is_checkpoint_id_of(&state.session_id, session_id) => {
                    summaries.extend(CheckpointSummary::from_state(&state))
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable checkpoint document: {}", e),
            }
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn store() -> SqliteSessionStore {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn checkpoint(session_id: &str, suffix: &str, name: &str) -> SessionState {
        let mut state = SessionState::new(
            format!("{}{}", checkpoint_id_prefix(session_id), suffix),
            "alice",
        );
        state.checkpoint_name = Some(name.to_string());
        state
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = store().await;
        assert_eq!(store.load("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_and_overwrite() {
        let store = store().await;
        let mut state = SessionState::new("s1", "alice");
        state
            .workspace_snapshot
            .files
            .insert("a.txt".into(), "hello".into());
        store.save(&state).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(state.clone()));

        state.conversation_history.push(serde_json::json!({"role": "user"}));
        store.save(&state).await.unwrap();
        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.conversation_history.len(), 1);
    }

    #[tokio::test]
    async fn test_list_checkpoints_matches_prefix_exactly() {
        let store = store().await;
        store.save(&SessionState::new("s1", "alice")).await.unwrap();
        store.save(&checkpoint("s1", "100", "first")).await.unwrap();
        store.save(&checkpoint("s1", "200", "second")).await.unwrap();
        // Would match the LIKE pattern 's1_restore_%' since '_' is a wildcard
        let mut lookalike = SessionState::new("s1Xrestore_300", "alice");
        lookalike.checkpoint_name = Some("other".to_string());
        store.save(&lookalike).await.unwrap();
        store.save(&checkpoint("s10", "400", "longer")).await.unwrap();
        store
            .save(&checkpoint("s1", "100_restore_500", "nested"))
            .await
            .unwrap();
        store.save(&checkpoint("s1", "200_3", "same millisecond")).await.unwrap();

        let names: Vec<String> = store
            .list_checkpoints("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.checkpoint_name)
            .collect();
        assert_eq!(names, vec!["first", "second", "same millisecond"]);
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected() {
        let store = store().await;
        let err = store.load("../x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let store = SqliteSessionStore::new(&path).await.unwrap();
            store.initialize().await.unwrap();
            store.save(&SessionState::new("s1", "alice")).await.unwrap();
            store.pool().close().await;
        }

        let reopened = SqliteSessionStore::new(&path).await.unwrap();
        reopened.initialize().await.unwrap();
        let loaded = reopened.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "alice");
    }
}
