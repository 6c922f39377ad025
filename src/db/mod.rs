//! SQLite-backed store for the profiling and gem-detection engine.
//!
//! The database is the working store shared with the ingestion and parsing
//! stages: those stages write the message-level tables, this engine reads
//! them and owns the profile/relationship/gem/segment tables. One pipeline
//! run per store at a time; the caller serializes runs.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub mod gems;
pub mod messages;
pub mod profiles;
pub mod relationships;

/// SQLite connection wrapper.
///
/// Intentionally NOT `Clone` or `Sync`; a run holds the only handle for its
/// duration.
pub struct SieveDb {
    conn: Connection,
}

impl SieveDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at `~/.gemsift/gemsift.db` and apply
    /// pending schema migrations.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.gemsift/gemsift.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".gemsift").join("gemsift.db"))
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| DbError::Transaction(format!("begin failed: {e}")))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| DbError::Transaction(format!("commit failed: {e}")))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn transaction_commits_on_ok() {
        let db = test_db();
        db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO domain_exclusions (domain, reason) VALUES ('x.com', 'test')",
                    [],
                )
                .map_err(DbError::Sqlite)?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM domain_exclusions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO domain_exclusions (domain, reason) VALUES ('y.com', 'test')",
                    [],
                )
                .map_err(DbError::Sqlite)?;
            Err(DbError::Transaction("forced".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM domain_exclusions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
