// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User preference lookups.
//!
//! Preferences are created lazily by the helpdesk UI; this subsystem only
//! reads them. Absence of a row means the documented defaults apply
//! (handled by the router, not here).

use std::str::FromStr;

use deskrelay_core::{DigestMode, NotificationKind, RelayError, UserPreference};
use rusqlite::params;

use crate::database::Database;

fn row_to_preference(row: &rusqlite::Row<'_>) -> Result<UserPreference, rusqlite::Error> {
    let kind_str: String = row.get(1)?;
    let kind = NotificationKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let digest_str: String = row.get(7)?;
    let digest = DigestMode::from_str(&digest_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(UserPreference {
        user_id: row.get(0)?,
        kind,
        in_app: row.get::<_, i64>(2)? != 0,
        email: row.get::<_, i64>(3)? != 0,
        push: row.get::<_, i64>(4)? != 0,
        sms: row.get::<_, i64>(5)? != 0,
        social: row.get::<_, i64>(6)? != 0,
        digest,
        quiet_hours_enabled: row.get::<_, i64>(8)? != 0,
        quiet_start_min: row.get::<_, i64>(9)? as u16,
        quiet_end_min: row.get::<_, i64>(10)? as u16,
    })
}

/// Fetch the preference for (user, kind), if one exists.
pub async fn get(
    db: &Database,
    user_id: &str,
    kind: NotificationKind,
) -> Result<Option<UserPreference>, RelayError> {
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, kind, in_app, email, push, sms, social, digest,
                        quiet_hours_enabled, quiet_start_min, quiet_end_min
                 FROM preferences WHERE user_id = ?1 AND kind = ?2",
            )?;
            match stmt.query_row(params![user_id, kind], row_to_preference) {
                Ok(pref) => Ok(Some(pref)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or replace a preference row. Used by tests and administrative
/// tooling; the production writer is the helpdesk UI.
pub async fn upsert(db: &Database, pref: &UserPreference) -> Result<(), RelayError> {
    let p = pref.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO preferences
                     (user_id, kind, in_app, email, push, sms, social, digest,
                      quiet_hours_enabled, quiet_start_min, quiet_end_min)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    p.user_id,
                    p.kind.to_string(),
                    p.in_app as i64,
                    p.email as i64,
                    p.push as i64,
                    p.sms as i64,
                    p.social as i64,
                    p.digest.to_string(),
                    p.quiet_hours_enabled as i64,
                    p.quiet_start_min as i64,
                    p.quiet_end_min as i64,
                ],
            )?;
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
    async fn upsert_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("p.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(get(&db, "u-1", NotificationKind::TicketReply)
            .await
            .unwrap()
            .is_none());

        let mut pref = UserPreference::defaults_for("u-1", NotificationKind::TicketReply);
        pref.push = true;
        pref.digest = DigestMode::Daily;
        pref.quiet_hours_enabled = true;
        pref.quiet_start_min = 22 * 60;
        pref.quiet_end_min = 6 * 60;
        upsert(&db, &pref).await.unwrap();

        let stored = get(&db, "u-1", NotificationKind::TicketReply)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.push);
        assert_eq!(stored.digest, DigestMode::Daily);
        assert!(stored.quiet_hours_enabled);
        assert_eq!(stored.quiet_start_min, 1320);
        assert_eq!(stored.quiet_end_min, 360);

        db.close().await.unwrap();
    }
}
