//! Append-only audit log.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::DbPool;
use crate::db::schema::audit_log;
use crate::error::{SetlistError, SetlistResult};
use crate::models::{AuditAction, AuditEntry};

/// Database row representation for audit entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuditRow {
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub target_id: i32,
    pub created_at: NaiveDateTime,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = SetlistError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            user_id: row.user_id,
            action: row.action.parse().map_err(SetlistError::Corrupt)?,
            target_id: row.target_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_log)]
struct NewAuditRow<'a> {
    user_id: i32,
    action: &'a str,
    target_id: i32,
    created_at: NaiveDateTime,
}

/// Audit log access.
///
/// Writes only happen through [`AuditLog::append`] on a connection that is
/// already inside the caller's transaction, so the entry commits or rolls back
/// together with the change it describes.
#[derive(Clone)]
pub struct AuditLog {
    pool: DbPool,
}

impl AuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    pub fn append(
        conn: &mut SqliteConnection,
        user_id: i32,
        action: AuditAction,
        target_id: i32,
        at: NaiveDateTime,
    ) -> SetlistResult<()> {
        diesel::insert_into(audit_log::table)
            .values(NewAuditRow {
                user_id,
                action: action.as_str(),
                target_id,
                created_at: at,
            })
            .execute(conn)?;
        Ok(())
    }

    /// Count a user's entries of one kind recorded at or after `since`.
    pub fn count_since(
        conn: &mut SqliteConnection,
        user_id: i32,
        action: AuditAction,
        since: NaiveDateTime,
    ) -> SetlistResult<i64> {
        let count = audit_log::table
            .filter(audit_log::user_id.eq(user_id))
            .filter(audit_log::action.eq(action.as_str()))
            .filter(audit_log::created_at.ge(since))
            .count()
            .get_result::<i64>(conn)?;
        Ok(count)
    }

    /// All entries about one target, oldest first.
    pub fn for_target(&self, target_id: i32) -> SetlistResult<Vec<AuditEntry>> {
        let mut conn = self.pool.get()?;

        let rows = audit_log::table
            .filter(audit_log::target_id.eq(target_id))
            .select(AuditRow::as_select())
            .order(audit_log::id.asc())
            .load(&mut conn)?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: i64) -> SetlistResult<Vec<AuditEntry>> {
        let mut conn = self.pool.get()?;

        let rows = audit_log::table
            .select(AuditRow::as_select())
            .order(audit_log::id.desc())
            .limit(limit)
            .load(&mut conn)?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::{now, testing};

    #[test]
    fn test_count_since_respects_window_and_action() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let t = now();

        AuditLog::append(&mut conn, 1, AuditAction::Propose, 10, t - Duration::minutes(90)).unwrap();
        AuditLog::append(&mut conn, 1, AuditAction::Propose, 11, t - Duration::minutes(5)).unwrap();
        AuditLog::append(&mut conn, 1, AuditAction::Vote, 11, t).unwrap();
        AuditLog::append(&mut conn, 2, AuditAction::Propose, 12, t).unwrap();

        let since = t - Duration::minutes(60);
        assert_eq!(
            AuditLog::count_since(&mut conn, 1, AuditAction::Propose, since).unwrap(),
            1
        );
    }

    #[test]
    fn test_for_target_lists_in_order() {
        let pool = testing::pool();
        {
            let mut conn = pool.get().unwrap();
            AuditLog::append(&mut conn, 1, AuditAction::Vote, 7, now()).unwrap();
            AuditLog::append(&mut conn, 2, AuditAction::Unvote, 7, now()).unwrap();
        }

        let log = AuditLog::new(pool);
        let actions: Vec<AuditAction> = log
            .for_target(7)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![AuditAction::Vote, AuditAction::Unvote]);
        assert_eq!(log.recent(1).unwrap()[0].action, AuditAction::Unvote);
    }
}
