// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification row operations.

use std::str::FromStr;

use deskrelay_core::{Notification, NotificationKind, RelayError};
use rusqlite::params;

use crate::database::Database;

/// Filters for listing and bulk operations. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    pub unread_only: bool,
}

/// Outcome of an ownership-checked single-row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The row was updated (or was already in the target state).
    Applied,
    /// The row exists but belongs to another user.
    NotOwner,
    /// No such row.
    Missing,
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> Result<Notification, rusqlite::Error> {
    let kind_str: String = row.get(1)?;
    let kind = NotificationKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let metadata_json: Option<String> = row.get(7)?;
    let metadata = match metadata_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(Notification {
        id: row.get(0)?,
        kind,
        title: row.get(2)?,
        body: row.get(3)?,
        user_id: row.get(4)?,
        related_id: row.get(5)?,
        actor_id: row.get(6)?,
        metadata,
        read: row.get::<_, i64>(8)? != 0,
        read_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const NOTIFICATION_COLUMNS: &str =
    "id, kind, title, body, user_id, related_id, actor_id, metadata, read, read_at, created_at";

/// Insert a freshly created notification. Returns the stored row (with the
/// database-generated created_at).
///
/// Triggers derive deterministic ids from the logical event, so a duplicate
/// trigger hits the same primary key; the insert is then skipped and the
/// already-stored row is returned unchanged.
pub async fn insert(db: &Database, notification: &Notification) -> Result<Notification, RelayError> {
    let n = notification.clone();
    let metadata_json = match &n.metadata {
        Some(meta) => Some(serde_json::to_string(meta).map_err(|e| RelayError::Storage {
            source: Box::new(e),
        })?),
        None => None,
    };
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO notifications (id, kind, title, body, user_id, related_id, actor_id, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.id,
                    n.kind.to_string(),
                    n.title,
                    n.body,
                    n.user_id,
                    n.related_id,
                    n.actor_id,
                    metadata_json
                ],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"
            ))?;
            stmt.query_row(params![n.id], row_to_notification)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one notification by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Notification>, RelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_notification) {
                Ok(n) => Ok(Some(n)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip the read flag for one notification, checking ownership.
///
/// Applying to an already-read notification is a no-op `Applied` -- the
/// client-visible effect is idempotent.
pub async fn mark_read(
    db: &Database,
    id: &str,
    user_id: &str,
) -> Result<MutationOutcome, RelayError> {
    let id = id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let owner: Option<String> = match conn.query_row(
                "SELECT user_id FROM notifications WHERE id = ?1",
                params![id],
                |row| row.get(0),
            ) {
                Ok(owner) => Some(owner),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            match owner {
                None => Ok(MutationOutcome::Missing),
                Some(owner) if owner != user_id => Ok(MutationOutcome::NotOwner),
                Some(_) => {
                    conn.execute(
                        "UPDATE notifications
                         SET read = 1, read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1 AND read = 0",
                        params![id],
                    )?;
                    Ok(MutationOutcome::Applied)
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark all unread notifications in scope as read. Returns the number of
/// rows flipped.
pub async fn mark_all_read(
    db: &Database,
    user_id: &str,
    filter: &NotificationFilter,
) -> Result<u64, RelayError> {
    let user_id = user_id.to_string();
    let kind = filter.kind.map(|k| k.to_string());
    db.connection()
        .call(move |conn| {
            let updated = match kind {
                Some(kind) => conn.execute(
                    "UPDATE notifications
                     SET read = 1, read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE user_id = ?1 AND kind = ?2 AND read = 0",
                    params![user_id, kind],
                )?,
                None => conn.execute(
                    "UPDATE notifications
                     SET read = 1, read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE user_id = ?1 AND read = 0",
                    params![user_id],
                )?,
            };
            Ok(updated as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count unread notifications in scope for a user.
pub async fn unread_count(
    db: &Database,
    user_id: &str,
    filter: &NotificationFilter,
) -> Result<i64, RelayError> {
    let user_id = user_id.to_string();
    let kind = filter.kind.map(|k| k.to_string());
    db.connection()
        .call(move |conn| {
            let count = match kind {
                Some(kind) => conn.query_row(
                    "SELECT COUNT(*) FROM notifications
                     WHERE user_id = ?1 AND kind = ?2 AND read = 0",
                    params![user_id, kind],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                    params![user_id],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// One page of a user's notifications, newest first, plus total and unread
/// counts for the same scope.
pub async fn list(
    db: &Database,
    user_id: &str,
    page: u32,
    page_size: u32,
    filter: &NotificationFilter,
) -> Result<(Vec<Notification>, i64, i64), RelayError> {
    let user_id = user_id.to_string();
    let kind = filter.kind.map(|k| k.to_string());
    let unread_only = filter.unread_only;
    let offset = (page.saturating_sub(1) as i64) * page_size as i64;
    let limit = page_size as i64;
    db.connection()
        .call(move |conn| {
            let mut where_clause = String::from("user_id = ?1");
            if kind.is_some() {
                where_clause.push_str(" AND kind = ?2");
            }
            if unread_only {
                where_clause.push_str(" AND read = 0");
            }

            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE {where_clause}
                 ORDER BY created_at DESC, id DESC
                 LIMIT {limit} OFFSET {offset}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let items: Vec<Notification> = match &kind {
                Some(kind) => stmt
                    .query_map(params![user_id, kind], row_to_notification)?
                    .collect::<Result<_, _>>()?,
                None => stmt
                    .query_map(params![user_id], row_to_notification)?
                    .collect::<Result<_, _>>()?,
            };

            let total: i64 = match &kind {
                Some(kind) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM notifications WHERE {where_clause}"),
                    params![user_id, kind],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    &format!("SELECT COUNT(*) FROM notifications WHERE {where_clause}"),
                    params![user_id],
                    |row| row.get(0),
                )?,
            };

            let unread: i64 = match &kind {
                Some(kind) => conn.query_row(
                    "SELECT COUNT(*) FROM notifications
                     WHERE user_id = ?1 AND kind = ?2 AND read = 0",
                    params![user_id, kind],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                    params![user_id],
                    |row| row.get(0),
                )?,
            };

            Ok((items, total, unread))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete one notification and its delivery log rows. Returns whether the
/// notification existed.
pub async fn delete(db: &Database, id: &str) -> Result<bool, RelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM delivery_log WHERE notification_id = ?1",
                params![id],
            )?;
            let deleted = tx.execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether a notification of the same (user, kind, related entity) was
/// created within the last `window_secs`. Used for time-windowed duplicate
/// suppression of social events.
pub async fn recent_exists(
    db: &Database,
    user_id: &str,
    kind: NotificationKind,
    related_id: &str,
    window_secs: u64,
) -> Result<bool, RelayError> {
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    let related_id = related_id.to_string();
    let modifier = format!("-{window_secs} seconds");
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications
                 WHERE user_id = ?1 AND kind = ?2 AND related_id = ?3
                   AND created_at >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?4)",
                params![user_id, kind, related_id, modifier],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
