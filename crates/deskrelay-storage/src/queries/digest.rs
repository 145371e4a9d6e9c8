// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-digest queue operations.
//!
//! The router defers non-realtime email here instead of silently dropping
//! it; the digest scheduler drains due batches into summary email jobs.

use deskrelay_core::{DigestMode, RelayError};
use rusqlite::params;

use crate::database::Database;
use crate::models::DigestEntry;

/// A flushable group of deferred events for one (user, cadence).
#[derive(Debug, Clone)]
pub struct DigestBatch {
    pub user_id: String,
    pub cadence: DigestMode,
    pub entries: Vec<DigestEntry>,
}

fn cadence_secs(cadence: DigestMode) -> u64 {
    match cadence {
        DigestMode::Realtime => 0,
        DigestMode::Hourly => 3600,
        DigestMode::Daily => 86_400,
        DigestMode::Weekly => 604_800,
    }
}

/// Record one deferred event for later batched delivery.
pub async fn push(
    db: &Database,
    user_id: &str,
    notification_id: &str,
    cadence: DigestMode,
) -> Result<(), RelayError> {
    let user_id = user_id.to_string();
    let notification_id = notification_id.to_string();
    let cadence = cadence.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO digest_queue (user_id, notification_id, cadence)
                 VALUES (?1, ?2, ?3)",
                params![user_id, notification_id, cadence],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Batches whose oldest unflushed entry has aged past its cadence window.
///
/// Each returned batch carries every unflushed entry for the (user,
/// cadence) pair, oldest first.
pub async fn due_batches(db: &Database, cadence: DigestMode) -> Result<Vec<DigestBatch>, RelayError> {
    let interval = cadence_secs(cadence);
    let cadence_str = cadence.to_string();
    let modifier = format!("-{interval} seconds");
    db.connection()
        .call(move |conn| {
            // Users whose oldest pending entry is due.
            let mut stmt = conn.prepare(
                "SELECT user_id FROM digest_queue
                 WHERE cadence = ?1 AND flushed = 0
                 GROUP BY user_id
                 HAVING MIN(created_at) <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2)",
            )?;
            let users: Vec<String> = stmt
                .query_map(params![cadence_str, modifier], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut batches = Vec::with_capacity(users.len());
            for user_id in users {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, notification_id, cadence, created_at
                     FROM digest_queue
                     WHERE user_id = ?1 AND cadence = ?2 AND flushed = 0
                     ORDER BY created_at ASC, id ASC",
                )?;
                let entries: Vec<DigestEntry> = stmt
                    .query_map(params![user_id, cadence_str], |row| {
                        Ok(DigestEntry {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            notification_id: row.get(2)?,
                            cadence: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                batches.push((user_id, entries));
            }
            Ok(batches)
        })
        .await
        .map_err(crate::database::map_tr_err)
        .map(|batches| {
            batches
                .into_iter()
                .map(|(user_id, entries)| DigestBatch {
                    user_id,
                    cadence,
                    entries,
                })
                .collect()
        })
}

/// Mark a drained batch's entries as flushed.
pub async fn mark_flushed(db: &Database, entry_ids: &[i64]) -> Result<(), RelayError> {
    let ids = entry_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for id in ids {
                tx.execute("UPDATE digest_queue SET flushed = 1 WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn entries_become_due_after_the_cadence_window() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("d.db").to_str().unwrap())
            .await
            .unwrap();

        push(&db, "u-1", "n-1", DigestMode::Hourly).await.unwrap();
        push(&db, "u-1", "n-2", DigestMode::Hourly).await.unwrap();

        // Fresh entries are not yet due.
        let due = due_batches(&db, DigestMode::Hourly).await.unwrap();
        assert!(due.is_empty());

        // Age the entries past the window.
        db.connection()
            .call(|conn| {
                conn.execute(
                    "UPDATE digest_queue
                     SET created_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-2 hours')",
                    [],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        let due = due_batches(&db, DigestMode::Hourly).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, "u-1");
        assert_eq!(due[0].entries.len(), 2);

        let ids: Vec<i64> = due[0].entries.iter().map(|e| e.id).collect();
        mark_flushed(&db, &ids).await.unwrap();

        let due = due_batches(&db, DigestMode::Hourly).await.unwrap();
        assert!(due.is_empty(), "flushed entries must not be re-delivered");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cadences_are_independent() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("d.db").to_str().unwrap())
            .await
            .unwrap();

        push(&db, "u-1", "n-1", DigestMode::Hourly).await.unwrap();
        push(&db, "u-1", "n-2", DigestMode::Daily).await.unwrap();

        db.connection()
            .call(|conn| {
                conn.execute(
                    "UPDATE digest_queue
                     SET created_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-2 hours')",
                    [],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        // Hourly is due; daily is not (only two hours old).
        let hourly = due_batches(&db, DigestMode::Hourly).await.unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].entries.len(), 1);
        let daily = due_batches(&db, DigestMode::Daily).await.unwrap();
        assert!(daily.is_empty());

        db.close().await.unwrap();
    }
}
