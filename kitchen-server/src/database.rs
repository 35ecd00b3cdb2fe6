use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct Database {
    pub pool: r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>,
}

impl Database {
    /// Open (or create) the SQLite file at `path` and bring its schema up to date.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {}", parent.display()))?;
        }
        let manager = r2d2_sqlite::SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = r2d2::Pool::new(manager)?;
        let me = Self { pool };
        me.migrate().await?;
        Ok(me)
    }

    /// Migrate the database to the latest version.
    async fn migrate(&self) -> Result<()> {
        let migrations = [
            include_str!("migrations/01-initial.sql"),
            include_str!("migrations/02-lookup-and-drafts.sql"),
        ];
        // Find the current migration version. If it fails, we need to run all the migrations.
        let conn = self.pool.get()?;
        let current_version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                rusqlite::params![],
                |row| row.get(0),
            )
            .unwrap_or("0".to_string());
        let current_version = current_version.parse::<usize>().unwrap_or(0);
        tracing::info!("Current schema version: {}", current_version);
        for (index, migration) in migrations.iter().enumerate().skip(current_version) {
            tracing::warn!("Applying migration {}", index + 1);
            conn.execute_batch(migration)
                .with_context(|| format!("Applying migration {}", index + 1))?;
        }
        Ok(())
    }

    /// Convenience method to collect rows from a query into a Vec.
    pub fn collect_rows<T: FromRow, P: rusqlite::Params>(
        &self,
        sql: &str,
        parameters: P,
    ) -> Result<Vec<T>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query(parameters)?;
        rows.mapped(T::from_row)
            .map(|r| r.map_err(Into::into))
            .collect::<Result<_>>()
    }
}

pub trait FromRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>
    where
        Self: Sized;
}

/// Read a column holding JSON text.
pub fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, name: &str) -> rusqlite::Result<T> {
    let text: String = row.get(name)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index(name).unwrap_or_default(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/kitchen.db");
        let path = path.to_str().unwrap();
        Database::connect(path).await.unwrap();
        // Reopening must not re-run the seed inserts or fail on existing tables.
        let db = Database::connect(path).await.unwrap();
        let version: String = db
            .pool
            .get()
            .unwrap()
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, "2");
    }
}
