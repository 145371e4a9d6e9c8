// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database harness for integration tests.
//!
//! Opens a migrated SQLite database in a temp directory that lives as
//! long as the harness value.

use deskrelay_core::RelayError;
use deskrelay_storage::Database;

/// A migrated, throwaway database.
pub struct TestDb {
    pub db: Database,
    // Held so the directory outlives the connection.
    _dir: tempfile::TempDir,
}

impl TestDb {
    pub async fn new() -> Result<Self, RelayError> {
        let dir = tempfile::TempDir::new().map_err(|e| RelayError::Storage {
            source: Box::new(e),
        })?;
        let path = dir.path().join("deskrelay-test.db");
        let db = Database::open(path.to_str().ok_or_else(|| RelayError::Internal(
            "temp path is not valid UTF-8".into(),
        ))?)
        .await?;
        Ok(Self { db, _dir: dir })
    }
}
