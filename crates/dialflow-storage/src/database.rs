// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use dialflow_core::DialflowError;
use tracing::debug;

use crate::migrations;

/// Per-connection settings applied to the single writer.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;";

/// Handle to the scheduler's SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and
    /// apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, DialflowError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing whether to switch the journal to WAL.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, DialflowError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), DialflowError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            if wal_mode {
                // journal_mode is persistent, so setting it once here covers later connections.
                conn.execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(storage_err)?;
            }
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| DialflowError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| DialflowError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(CONNECTION_PRAGMAS)
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The single writer connection. Query modules run their closures on it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), DialflowError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| DialflowError::Storage {
            source: Box::new(e),
        })
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), DialflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

fn storage_err(e: rusqlite::Error) -> DialflowError {
    DialflowError::Storage {
        source: Box::new(e),
    }
}

/// Map a failed `Connection::call` into the storage error variant.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> DialflowError {
    DialflowError::Storage {
        source: Box::new(e),
    }
}
