//! Setlist ordering: admin reorder and the order backfill.

use std::collections::HashSet;
use std::sync::Arc;

use diesel::dsl::max;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::DbPool;
use crate::db::schema::proposals;
use crate::error::{SetlistError, SetlistResult};
use crate::events::{ChangeEvent, ChangeNotifier};
use crate::models::{Identity, ProposalStatus};
use crate::setlist::require_admin;

/// Position one past the current end of the setlist.
pub fn next_setlist_order(conn: &mut SqliteConnection) -> SetlistResult<i32> {
    let current: Option<i32> = proposals::table
        .filter(proposals::status.eq(ProposalStatus::Approved.as_str()))
        .select(max(proposals::setlist_order))
        .first(conn)?;
    Ok(current.unwrap_or(0) + 1)
}

/// Approved proposal ids in display order: ordered entries first, then
/// unordered ones most recently updated first.
pub fn approved_ids_in_order(conn: &mut SqliteConnection) -> SetlistResult<Vec<i32>> {
    let ids = proposals::table
        .filter(proposals::status.eq(ProposalStatus::Approved.as_str()))
        .order((
            proposals::setlist_order.is_null().asc(),
            proposals::setlist_order.asc(),
            proposals::updated_at.desc(),
            proposals::id.desc(),
        ))
        .select(proposals::id)
        .load(conn)?;
    Ok(ids)
}

/// Service owning setlist positions.
#[derive(Clone)]
pub struct SetlistOrdering {
    pool: DbPool,
    notifier: Arc<ChangeNotifier>,
}

impl SetlistOrdering {
    pub fn new(pool: DbPool, notifier: Arc<ChangeNotifier>) -> Self {
        Self { pool, notifier }
    }

    /// Rewrite the setlist so `ids` occupy positions `1..=n` in the given order.
    ///
    /// Approved proposals not named keep their relative order after the named
    /// ones. Every id must refer to an approved proposal; otherwise nothing is
    /// written and the first offending id is reported. Returns the full
    /// resulting order.
    pub fn reorder(&self, actor: &Identity, ids: &[i32]) -> SetlistResult<Vec<i32>> {
        require_admin(actor)?;

        if ids.is_empty() {
            return Err(SetlistError::validation("ids must not be empty"));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(SetlistError::validation(format!("duplicate id {dup}")));
        }

        let mut conn = self.pool.get()?;
        let order = conn.immediate_transaction(|conn| {
            let current = approved_ids_in_order(conn)?;
            let approved: HashSet<i32> = current.iter().copied().collect();
            if let Some(bad) = ids.iter().find(|id| !approved.contains(*id)) {
                return Err(SetlistError::InvalidOrder(*bad));
            }

            let rest = current.into_iter().filter(|id| !seen.contains(id));
            let order: Vec<i32> = ids.iter().copied().chain(rest).collect();
            write_positions(conn, &order)?;
            Ok(order)
        })?;

        tracing::info!(admin_id = actor.user_id, count = ids.len(), "Setlist reordered");
        self.notifier.publish(ChangeEvent::SetlistReordered { ids: ids.to_vec() });
        Ok(order)
    }

    /// Current setlist as ids.
    pub fn current(&self) -> SetlistResult<Vec<i32>> {
        let mut conn = self.pool.get()?;
        approved_ids_in_order(&mut conn)
    }

    /// Give every approved proposal without a position one at the end of the
    /// setlist, most recently updated first. Returns how many were assigned.
    pub fn backfill(&self) -> SetlistResult<usize> {
        let mut conn = self.pool.get()?;
        let assigned = conn.immediate_transaction(|conn| {
            let missing: Vec<i32> = proposals::table
                .filter(proposals::status.eq(ProposalStatus::Approved.as_str()))
                .filter(proposals::setlist_order.is_null())
                .order((proposals::updated_at.desc(), proposals::id.desc()))
                .select(proposals::id)
                .load(conn)?;

            let mut next = next_setlist_order(conn)?;
            for id in &missing {
                diesel::update(proposals::table.find(*id))
                    .set(proposals::setlist_order.eq(next))
                    .execute(conn)?;
                next += 1;
            }
            Ok::<_, SetlistError>(missing.len())
        })?;

        if assigned > 0 {
            tracing::info!(assigned, "Backfilled setlist positions");
        }
        Ok(assigned)
    }
}

/// Assign positions `1..=n` following `order`. Clears every approved position
/// first so the unique index never sees a transient duplicate.
fn write_positions(conn: &mut SqliteConnection, order: &[i32]) -> SetlistResult<()> {
    diesel::update(proposals::table.filter(proposals::status.eq(ProposalStatus::Approved.as_str())))
        .set(proposals::setlist_order.eq(None::<i32>))
        .execute(conn)?;

    for (position, id) in (1..).zip(order) {
        diesel::update(proposals::table.find(*id))
            .set(proposals::setlist_order.eq(Some(position)))
            .execute(conn)?;
    }
    Ok(())
}
