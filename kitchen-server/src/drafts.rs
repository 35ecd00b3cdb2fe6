use kitchen::drafts::{DraftError, DraftStorage};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

/// Draft storage for one user, in the `Draft` table.
#[derive(Clone)]
pub struct SqliteDraftStorage {
    db: Database,
    user_id: String,
}

impl SqliteDraftStorage {
    pub fn new(db: Database, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, DraftError> {
        self.db.pool.get().map_err(|e| DraftError::Backend(e.into()))
    }
}

fn backend(e: rusqlite::Error) -> DraftError {
    DraftError::Backend(e.into())
}

impl DraftStorage for SqliteDraftStorage {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        self.conn()?
            .query_row(
                "SELECT value FROM Draft WHERE user_id = ? AND draft_key = ?",
                params![self.user_id, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.conn()?
            .execute(
                "INSERT INTO Draft (user_id, draft_key, value) VALUES (?, ?, ?)
                    ON CONFLICT (user_id, draft_key) DO UPDATE SET value = excluded.value",
                params![self.user_id, key, value],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.conn()?
            .execute(
                "DELETE FROM Draft WHERE user_id = ? AND draft_key = ?",
                params![self.user_id, key],
            )
            .map_err(backend)?;
        Ok(())
    }
}
