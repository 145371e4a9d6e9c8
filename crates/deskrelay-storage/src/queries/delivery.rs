// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery log operations.
//!
//! One row per (notification, channel); the UNIQUE constraint makes row
//! creation idempotent and forces retries to update in place. Status
//! transitions (`pending` -> `sent` | `failed`) are single atomic UPDATEs
//! keyed by the pair, so a late retry completing after a duplicate
//! fast-path send cannot corrupt state.

use std::str::FromStr;

use deskrelay_core::{DeliveryChannel, DeliveryLogEntry, DeliveryStatus, RelayError};
use rusqlite::params;

use crate::database::Database;

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<DeliveryLogEntry, rusqlite::Error> {
    let channel_str: String = row.get(2)?;
    let channel = DeliveryChannel::from_str(&channel_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status_str: String = row.get(3)?;
    let status = DeliveryStatus::from_str(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DeliveryLogEntry {
        id: row.get(0)?,
        notification_id: row.get(1)?,
        channel,
        status,
        recipient: row.get(4)?,
        sent_at: row.get(5)?,
        failed_at: row.get(6)?,
        error_message: row.get(7)?,
        attempts: row.get(8)?,
        message_id: row.get(9)?,
    })
}

const ENTRY_COLUMNS: &str = "id, notification_id, channel, status, recipient, sent_at, \
                             failed_at, error_message, attempts, message_id";

/// Create the `pending` row for a (notification, channel) pair.
///
/// Returns `true` when a new row was created, `false` when an entry for
/// the pair already existed (duplicate fan-out is a no-op).
pub async fn create_pending(
    db: &Database,
    notification_id: &str,
    channel: DeliveryChannel,
    recipient: Option<&str>,
) -> Result<bool, RelayError> {
    let notification_id = notification_id.to_string();
    let channel = channel.to_string();
    let recipient = recipient.map(|r| r.to_string());
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO delivery_log (notification_id, channel, recipient)
                 VALUES (?1, ?2, ?3)",
                params![notification_id, channel, recipient],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition the pair's entry to `sent`, recording the timestamp and the
/// transport message id. Idempotent; a second call leaves the row sent.
pub async fn mark_sent(
    db: &Database,
    notification_id: &str,
    channel: DeliveryChannel,
    attempts: i32,
    message_id: Option<&str>,
) -> Result<(), RelayError> {
    let notification_id = notification_id.to_string();
    let channel = channel.to_string();
    let message_id = message_id.map(|m| m.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE delivery_log
                 SET status = 'sent',
                     sent_at = COALESCE(sent_at, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                     attempts = MAX(attempts, ?3),
                     message_id = COALESCE(?4, message_id),
                     error_message = NULL
                 WHERE notification_id = ?1 AND channel = ?2",
                params![notification_id, channel, attempts, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition the pair's entry to `failed` with the last error message.
///
/// A pair that already reached `sent` stays sent -- a late retry failure
/// after a successful duplicate send must not regress the row.
pub async fn mark_failed(
    db: &Database,
    notification_id: &str,
    channel: DeliveryChannel,
    attempts: i32,
    error: &str,
) -> Result<(), RelayError> {
    let notification_id = notification_id.to_string();
    let channel = channel.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE delivery_log
                 SET status = 'failed',
                     failed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     attempts = MAX(attempts, ?3),
                     error_message = ?4
                 WHERE notification_id = ?1 AND channel = ?2 AND status != 'sent'",
                params![notification_id, channel, attempts, error],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the entry for one (notification, channel) pair.
pub async fn entry(
    db: &Database,
    notification_id: &str,
    channel: DeliveryChannel,
) -> Result<Option<DeliveryLogEntry>, RelayError> {
    let notification_id = notification_id.to_string();
    let channel = channel.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM delivery_log
                 WHERE notification_id = ?1 AND channel = ?2"
            ))?;
            match stmt.query_row(params![notification_id, channel], row_to_entry) {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All delivery entries for a notification (observability).
pub async fn for_notification(
    db: &Database,
    notification_id: &str,
) -> Result<Vec<DeliveryLogEntry>, RelayError> {
    let notification_id = notification_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM delivery_log
                 WHERE notification_id = ?1 ORDER BY channel ASC"
            ))?;
            let entries = stmt
                .query_map(params![notification_id], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chronological chain of outbound email message ids for one related
/// entity, deduplicated, oldest first.
///
/// Feeds the `references` header on threaded replies: the first element is
/// the original creation message id, and `in_reply_to` is the last element.
pub async fn email_thread(db: &Database, related_id: &str) -> Result<Vec<String>, RelayError> {
    let related_id = related_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.message_id
                 FROM delivery_log d
                 JOIN notifications n ON n.id = d.notification_id
                 WHERE n.related_id = ?1 AND d.channel = 'email'
                   AND d.message_id IS NOT NULL AND d.sent_at IS NOT NULL
                 ORDER BY d.sent_at ASC, d.id ASC",
            )?;
            let ids: Vec<String> = stmt
                .query_map(params![related_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;

            // Dedup while preserving chronological order.
            let mut seen = std::collections::HashSet::new();
            let chain = ids
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            Ok(chain)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::notifications;
    use deskrelay_core::{Notification, NotificationKind};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn seed_notification(db: &Database, id: &str, related: &str) {
        notifications::insert(
            db,
            &Notification {
                id: id.to_string(),
                kind: NotificationKind::TicketReply,
                title: "Re: printer on fire".to_string(),
                body: "reply".to_string(),
                user_id: "u-1".to_string(),
                related_id: Some(related.to_string()),
                actor_id: None,
                metadata: None,
                read: false,
                read_at: None,
                created_at: String::new(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_pending_is_idempotent() {
        let (db, _dir) = setup_db().await;
        seed_notification(&db, "n-1", "ticket-1").await;

        assert!(create_pending(&db, "n-1", DeliveryChannel::Email, Some("a@b.c"))
            .await
            .unwrap());
        assert!(!create_pending(&db, "n-1", DeliveryChannel::Email, Some("a@b.c"))
            .await
            .unwrap());

        let e = entry(&db, "n-1", DeliveryChannel::Email).await.unwrap().unwrap();
        assert_eq!(e.status, DeliveryStatus::Pending);
        assert_eq!(e.attempts, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sent_then_failed_does_not_regress() {
        let (db, _dir) = setup_db().await;
        seed_notification(&db, "n-1", "ticket-1").await;
        create_pending(&db, "n-1", DeliveryChannel::Email, None)
            .await
            .unwrap();

        mark_sent(&db, "n-1", DeliveryChannel::Email, 1, Some("<m1@relay>"))
            .await
            .unwrap();
        // Late duplicate retry fails after the fast path already succeeded.
        mark_failed(&db, "n-1", DeliveryChannel::Email, 2, "smtp timeout")
            .await
            .unwrap();

        let e = entry(&db, "n-1", DeliveryChannel::Email).await.unwrap().unwrap();
        assert_eq!(e.status, DeliveryStatus::Sent);
        assert_eq!(e.message_id.as_deref(), Some("<m1@relay>"));
        assert!(e.error_message.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_entry_is_queryable_with_reason() {
        let (db, _dir) = setup_db().await;
        seed_notification(&db, "n-1", "ticket-1").await;
        create_pending(&db, "n-1", DeliveryChannel::Push, None)
            .await
            .unwrap();

        mark_failed(&db, "n-1", DeliveryChannel::Push, 3, "subscription expired")
            .await
            .unwrap();

        let e = entry(&db, "n-1", DeliveryChannel::Push).await.unwrap().unwrap();
        assert_eq!(e.status, DeliveryStatus::Failed);
        assert_eq!(e.attempts, 3);
        assert_eq!(e.error_message.as_deref(), Some("subscription expired"));
        assert!(e.failed_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn email_thread_grows_in_order_and_dedups() {
        let (db, _dir) = setup_db().await;

        for (n, mid) in [("n-1", "<m1@relay>"), ("n-2", "<m2@relay>"), ("n-3", "<m3@relay>")] {
            seed_notification(&db, n, "ticket-1").await;
            create_pending(&db, n, DeliveryChannel::Email, None)
                .await
                .unwrap();
            mark_sent(&db, n, DeliveryChannel::Email, 1, Some(mid))
                .await
                .unwrap();
            // Spread sent_at so ordering is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        // A duplicate message id (retried send recorded twice) must not
        // appear twice in the chain.
        seed_notification(&db, "n-4", "ticket-1").await;
        create_pending(&db, "n-4", DeliveryChannel::Email, None)
            .await
            .unwrap();
        mark_sent(&db, "n-4", DeliveryChannel::Email, 2, Some("<m3@relay>"))
            .await
            .unwrap();

        let chain = email_thread(&db, "ticket-1").await.unwrap();
        assert_eq!(chain, vec!["<m1@relay>", "<m2@relay>", "<m3@relay>"]);

        // Other tickets have independent chains.
        assert!(email_thread(&db, "ticket-2").await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn for_notification_lists_all_channels() {
        let (db, _dir) = setup_db().await;
        seed_notification(&db, "n-1", "ticket-1").await;
        create_pending(&db, "n-1", DeliveryChannel::InApp, None)
            .await
            .unwrap();
        create_pending(&db, "n-1", DeliveryChannel::Email, Some("a@b.c"))
            .await
            .unwrap();
        mark_sent(&db, "n-1", DeliveryChannel::InApp, 1, None)
            .await
            .unwrap();

        let entries = for_notification(&db, "n-1").await.unwrap();
        assert_eq!(entries.len(), 2);

        db.close().await.unwrap();
    }
}
