//! SQLite connection pool for the chapter store.
//!
//! Books, chapters, versions, chunks, proposals, and comments all live
//! in one SQLite file. WAL mode keeps reads (editor, API) from
//! blocking the save path's writes, and `foreign_keys` is switched on
//! because the schema leans on `ON DELETE CASCADE` to clear a
//! chapter's versions, chunks, proposals, and comments with it.

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DbConfig;

/// Operations are request-scoped and short; a handful of connections
/// covers the CLI, the API server, and their overlap.
const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if missing) the database named by the config,
/// including any missing parent directories.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database at {}", db.path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn connect_creates_parents_and_enforces_foreign_keys() {
        let tmp = TempDir::new().unwrap();
        let db = DbConfig {
            path: tmp.path().join("nested/data/scriptorium.sqlite"),
        };

        let pool = connect(&db).await.unwrap();
        assert!(db.path.exists());

        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }
}
