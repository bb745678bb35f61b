//! Vote ledger: one vote per (user, proposal).

use std::sync::Arc;

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::schema::{proposals, votes};
use crate::db::{AuditLog, DbPool, now};
use crate::error::{SetlistError, SetlistResult};
use crate::events::{ChangeEvent, ChangeNotifier};
use crate::models::AuditAction;
use crate::setlist::promotion::{Promotion, PromotionEngine};

#[derive(Clone)]
pub struct VoteLedger {
    pool: DbPool,
    promotion: PromotionEngine,
    notifier: Arc<ChangeNotifier>,
}

impl VoteLedger {
    pub fn new(pool: DbPool, promotion: PromotionEngine, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            pool,
            promotion,
            notifier,
        }
    }

    /// Record a vote, audit it and evaluate promotion in one transaction.
    pub fn cast_vote(&self, user_id: i32, proposal_id: i32) -> SetlistResult<Promotion> {
        let mut conn = self.pool.get()?;

        let outcome = conn.immediate_transaction(|conn| {
            let exists: i64 = proposals::table
                .find(proposal_id)
                .count()
                .get_result(conn)?;
            if exists == 0 {
                return Err(SetlistError::not_found("Proposal", proposal_id));
            }

            let at = now();
            diesel::insert_into(votes::table)
                .values((
                    votes::user_id.eq(user_id),
                    votes::proposal_id.eq(proposal_id),
                    votes::created_at.eq(at),
                ))
                .execute(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        SetlistError::Conflict("Already voted".to_string())
                    }
                    other => other.into(),
                })?;

            AuditLog::append(conn, user_id, AuditAction::Vote, proposal_id, at)?;
            self.promotion.evaluate(conn, proposal_id, at)
        })?;

        tracing::debug!(user_id, proposal_id, ?outcome, "Vote cast");
        self.notifier.publish(ChangeEvent::ProposalUpdated { id: proposal_id });
        Ok(outcome)
    }

    /// Remove a vote. Never demotes an approved proposal.
    pub fn retract_vote(&self, user_id: i32, proposal_id: i32) -> SetlistResult<()> {
        let mut conn = self.pool.get()?;

        conn.immediate_transaction(|conn| {
            let deleted = diesel::delete(
                votes::table
                    .filter(votes::user_id.eq(user_id))
                    .filter(votes::proposal_id.eq(proposal_id)),
            )
            .execute(conn)?;
            if deleted == 0 {
                return Err(SetlistError::NotFound("Vote".to_string()));
            }
            AuditLog::append(conn, user_id, AuditAction::Unvote, proposal_id, now())
        })?;

        tracing::debug!(user_id, proposal_id, "Vote retracted");
        self.notifier.publish(ChangeEvent::ProposalUpdated { id: proposal_id });
        Ok(())
    }

    pub fn count_votes(&self, proposal_id: i32) -> SetlistResult<i64> {
        let mut conn = self.pool.get()?;
        let count = votes::table
            .filter(votes::proposal_id.eq(proposal_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count)
    }

    pub fn has_voted(&self, user_id: i32, proposal_id: i32) -> SetlistResult<bool> {
        let mut conn = self.pool.get()?;
        let count: i64 = votes::table
            .filter(votes::user_id.eq(user_id))
            .filter(votes::proposal_id.eq(proposal_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::db::{DbConfig, SettingsDefaults, SettingsStore, run_migrations, testing};
    use crate::models::ProposalStatus;

    fn ledger(pool: &DbPool) -> VoteLedger {
        let notifier = Arc::new(ChangeNotifier::default());
        let settings = SettingsStore::new(pool.clone(), SettingsDefaults::default());
        let promotion = PromotionEngine::new(pool.clone(), settings, notifier.clone());
        VoteLedger::new(pool.clone(), promotion, notifier)
    }

    fn status_of(pool: &DbPool, id: i32) -> (String, Option<i32>) {
        let mut conn = pool.get().unwrap();
        proposals::table
            .find(id)
            .select((proposals::status, proposals::setlist_order))
            .first(&mut conn)
            .unwrap()
    }

    #[test]
    fn test_threshold_walkthrough() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let b = testing::user(&pool, "b@band.com", false);
        let c = testing::user(&pool, "c@band.com", false);
        let ledger = ledger(&pool);
        let p = testing::insert_proposal(&pool, a, "Song X", ProposalStatus::Pending);

        assert!(!ledger.cast_vote(a, p).unwrap().is_promoted());
        assert_eq!(status_of(&pool, p).0, "PENDING");

        assert!(ledger.cast_vote(b, p).unwrap().is_promoted());
        assert_eq!(status_of(&pool, p), ("APPROVED".to_string(), Some(1)));

        assert!(matches!(
            ledger.cast_vote(c, p).unwrap(),
            Promotion::Unchanged(ProposalStatus::Approved)
        ));
        assert_eq!(ledger.count_votes(p).unwrap(), 3);
    }

    #[test]
    fn test_duplicate_vote_conflicts() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let ledger = ledger(&pool);
        let p = testing::insert_proposal(&pool, a, "Song", ProposalStatus::Pending);

        ledger.cast_vote(a, p).unwrap();
        assert!(matches!(ledger.cast_vote(a, p), Err(SetlistError::Conflict(_))));
        assert_eq!(ledger.count_votes(p).unwrap(), 1);
        assert!(ledger.has_voted(a, p).unwrap());
    }

    #[test]
    fn test_vote_on_missing_proposal() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        assert!(matches!(ledger(&pool).cast_vote(a, 77), Err(SetlistError::NotFound(_))));
    }

    #[test]
    fn test_retract_does_not_demote() {
        let pool = testing::pool();
        let a = testing::user(&pool, "a@band.com", false);
        let b = testing::user(&pool, "b@band.com", false);
        let ledger = ledger(&pool);
        let p = testing::insert_proposal(&pool, a, "Song", ProposalStatus::Pending);

        ledger.cast_vote(a, p).unwrap();
        ledger.cast_vote(b, p).unwrap();
        ledger.retract_vote(b, p).unwrap();

        assert_eq!(status_of(&pool, p).0, "APPROVED");
        assert!(!ledger.has_voted(b, p).unwrap());
        assert!(matches!(ledger.retract_vote(b, p), Err(SetlistError::NotFound(_))));

        let actions: Vec<AuditAction> = AuditLog::new(pool.clone())
            .for_target(p)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![AuditAction::Vote, AuditAction::Vote, AuditAction::Unvote]
        );
    }

    #[test]
    fn test_concurrent_votes_promote_once() {
        let path = std::env::temp_dir().join(format!("setlist-votes-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let config = DbConfig::new(path.to_string_lossy().to_string());
        let pool = config.build_pool().unwrap();
        run_migrations(&mut pool.get().unwrap()).unwrap();

        let voters: Vec<i32> = (0..6)
            .map(|n| testing::user(&pool, &format!("m{n}@band.com"), false))
            .collect();
        let ledger = ledger(&pool);
        let p = testing::insert_proposal(&pool, voters[0], "Race", ProposalStatus::Pending);

        let handles: Vec<_> = voters
            .iter()
            .map(|&uid| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.cast_vote(uid, p).unwrap())
            })
            .collect();
        let promoted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Promotion::is_promoted)
            .count();

        assert_eq!(promoted, 1);
        assert_eq!(status_of(&pool, p), ("APPROVED".to_string(), Some(1)));
        assert_eq!(ledger.count_votes(p).unwrap(), 6);

        drop(pool);
        let _ = std::fs::remove_file(&path);
    }
}
