//! Promotion of pending proposals once they reach the vote threshold.

use std::sync::Arc;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::schema::{proposals, votes};
use crate::db::{DbPool, SettingsStore, now};
use crate::error::{SetlistError, SetlistResult};
use crate::events::{ChangeEvent, ChangeNotifier};
use crate::models::ProposalStatus;
use crate::setlist::ordering::next_setlist_order;

/// Result of evaluating one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Moved to APPROVED and appended to the setlist.
    Promoted { setlist_order: i32 },
    /// Still pending.
    BelowThreshold { votes: i64, threshold: i32 },
    /// Not pending; nothing to do.
    Unchanged(ProposalStatus),
}

impl Promotion {
    pub fn is_promoted(&self) -> bool {
        matches!(self, Promotion::Promoted { .. })
    }
}

/// Threshold check and PENDING → APPROVED transition.
#[derive(Clone)]
pub struct PromotionEngine {
    pool: DbPool,
    settings: SettingsStore,
    notifier: Arc<ChangeNotifier>,
}

impl PromotionEngine {
    pub fn new(pool: DbPool, settings: SettingsStore, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            pool,
            settings,
            notifier,
        }
    }

    /// Evaluate a proposal in its own transaction.
    pub fn evaluate_now(&self, proposal_id: i32) -> SetlistResult<Promotion> {
        let mut conn = self.pool.get()?;
        let outcome = conn.immediate_transaction(|conn| self.evaluate(conn, proposal_id, now()))?;
        if outcome.is_promoted() {
            self.notifier.publish(ChangeEvent::ProposalUpdated { id: proposal_id });
        }
        Ok(outcome)
    }

    /// Evaluate on a connection already inside the caller's transaction.
    ///
    /// Idempotent: a proposal that is no longer pending is left alone. The
    /// count and the status write see the same snapshot because the caller
    /// holds the write lock.
    pub fn evaluate(
        &self,
        conn: &mut SqliteConnection,
        proposal_id: i32,
        at: NaiveDateTime,
    ) -> SetlistResult<Promotion> {
        let status: String = proposals::table
            .find(proposal_id)
            .select(proposals::status)
            .first(conn)
            .optional()?
            .ok_or_else(|| SetlistError::not_found("Proposal", proposal_id))?;
        let status: ProposalStatus = status.parse().map_err(SetlistError::Corrupt)?;

        if status != ProposalStatus::Pending {
            return Ok(Promotion::Unchanged(status));
        }

        let threshold = self.settings.vote_threshold(conn)?;
        let votes: i64 = votes::table
            .filter(votes::proposal_id.eq(proposal_id))
            .count()
            .get_result(conn)?;

        if votes < i64::from(threshold) {
            return Ok(Promotion::BelowThreshold { votes, threshold });
        }

        let setlist_order = next_setlist_order(conn)?;
        diesel::update(
            proposals::table
                .find(proposal_id)
                .filter(proposals::status.eq(ProposalStatus::Pending.as_str())),
        )
        .set((
            proposals::status.eq(ProposalStatus::Approved.as_str()),
            proposals::setlist_order.eq(Some(setlist_order)),
            proposals::updated_at.eq(at),
        ))
        .execute(conn)?;

        tracing::info!(proposal_id, votes, threshold, setlist_order, "Proposal promoted");
        Ok(Promotion::Promoted { setlist_order })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SettingsDefaults, SettingsUpdate, testing};

    fn engine(pool: &DbPool) -> PromotionEngine {
        let settings = SettingsStore::new(pool.clone(), SettingsDefaults::default());
        PromotionEngine::new(pool.clone(), settings, Arc::new(ChangeNotifier::default()))
    }

    fn vote(pool: &DbPool, user_id: i32, proposal_id: i32) {
        let mut conn = pool.get().unwrap();
        diesel::insert_into(votes::table)
            .values((
                votes::user_id.eq(user_id),
                votes::proposal_id.eq(proposal_id),
                votes::created_at.eq(now()),
            ))
            .execute(&mut conn)
            .unwrap();
    }

    #[test]
    fn test_promotes_at_threshold_and_appends() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let b = testing::user(&pool, "b@band.com", false);
        let engine = engine(&pool);

        let earlier = testing::insert_proposal(&pool, a, "Already In", ProposalStatus::Approved);
        {
            let mut conn = pool.get().unwrap();
            diesel::update(proposals::table.find(earlier))
                .set(proposals::setlist_order.eq(Some(4)))
                .execute(&mut conn)
                .unwrap();
        }

        let p = testing::insert_proposal(&pool, a, "Song", ProposalStatus::Pending);
        vote(&pool, a, p);
        assert_eq!(
            engine.evaluate_now(p).unwrap(),
            Promotion::BelowThreshold {
                votes: 1,
                threshold: 2
            }
        );

        vote(&pool, b, p);
        assert_eq!(engine.evaluate_now(p).unwrap(), Promotion::Promoted { setlist_order: 5 });
        assert_eq!(
            engine.evaluate_now(p).unwrap(),
            Promotion::Unchanged(ProposalStatus::Approved)
        );
    }

    #[test]
    fn test_respects_stored_threshold() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let engine = engine(&pool);
        engine.settings.update(&SettingsUpdate::new(1, None).unwrap()).unwrap();

        let p = testing::insert_proposal(&pool, a, "Song", ProposalStatus::Pending);
        vote(&pool, a, p);
        assert!(engine.evaluate_now(p).unwrap().is_promoted());
    }

    #[test]
    fn test_archived_and_missing() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let engine = engine(&pool);

        let p = testing::insert_proposal(&pool, a, "Old", ProposalStatus::Archived);
        assert_eq!(
            engine.evaluate_now(p).unwrap(),
            Promotion::Unchanged(ProposalStatus::Archived)
        );
        assert!(matches!(engine.evaluate_now(404), Err(SetlistError::NotFound(_))));
    }
}
