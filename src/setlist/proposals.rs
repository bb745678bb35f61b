//! Proposal repository: creation, admin edits and the listing queries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::schema::{proposals, votes};
use crate::db::{AuditLog, DbPool, SettingsStore, now};
use crate::error::{SetlistError, SetlistResult};
use crate::events::{ChangeEvent, ChangeNotifier};
use crate::models::{AuditAction, Identity, PendingProposal, Proposal, ProposalStatus, ProposalSummary};
use crate::setlist::ordering::next_setlist_order;
use crate::setlist::require_admin;
use crate::setlist::validation::{NewProposal, ProposalInput, ProposalPatchInput};

/// Proposals a member may create per window.
pub const PROPOSALS_PER_WINDOW: i64 = 10;
/// Length of the trailing rate-limit window.
pub const RATE_WINDOW_MINUTES: i64 = 60;

/// Database row representation for proposals.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = proposals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProposalRow {
    pub id: i32,
    pub proposer_id: i32,
    pub title: String,
    pub artist: String,
    pub chart_url: Option<String>,
    pub lyrics_url: Option<String>,
    pub youtube_url: Option<String>,
    pub status: String,
    pub setlist_order: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = SetlistError;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        Ok(Proposal {
            id: row.id,
            proposer_id: row.proposer_id,
            title: row.title,
            artist: row.artist,
            chart_url: row.chart_url,
            lyrics_url: row.lyrics_url,
            youtube_url: row.youtube_url,
            status: row.status.parse().map_err(SetlistError::Corrupt)?,
            setlist_order: row.setlist_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = proposals)]
struct NewProposalRow<'a> {
    proposer_id: i32,
    title: &'a str,
    artist: &'a str,
    chart_url: Option<&'a str>,
    lyrics_url: Option<&'a str>,
    youtube_url: Option<&'a str>,
    status: &'a str,
    setlist_order: Option<i32>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl<'a> NewProposalRow<'a> {
    fn new(proposer_id: i32, fields: &'a NewProposal, at: NaiveDateTime) -> Self {
        Self {
            proposer_id,
            title: &fields.title,
            artist: &fields.artist,
            chart_url: fields.chart_url.as_deref(),
            lyrics_url: fields.lyrics_url.as_deref(),
            youtube_url: fields.youtube_url.as_deref(),
            status: ProposalStatus::Pending.as_str(),
            setlist_order: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Partial update. `None` fields are skipped; `Some(None)` writes NULL.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = proposals)]
struct ProposalChangeset<'a> {
    title: Option<&'a str>,
    artist: Option<&'a str>,
    chart_url: Option<Option<&'a str>>,
    lyrics_url: Option<Option<&'a str>>,
    youtube_url: Option<Option<&'a str>>,
    status: Option<&'a str>,
    setlist_order: Option<Option<i32>>,
    updated_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct ProposalRepository {
    pool: DbPool,
    settings: SettingsStore,
    notifier: Arc<ChangeNotifier>,
}

impl ProposalRepository {
    pub fn new(pool: DbPool, settings: SettingsStore, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            pool,
            settings,
            notifier,
        }
    }

    /// Create a PENDING proposal on behalf of a member.
    ///
    /// Fails with [`SetlistError::RateLimited`] once the member has proposed
    /// [`PROPOSALS_PER_WINDOW`] times in the trailing window.
    pub fn create(&self, proposer_id: i32, input: ProposalInput) -> SetlistResult<Proposal> {
        let fields = input.validate()?;
        let mut conn = self.pool.get()?;

        let proposal = conn.immediate_transaction(|conn| {
            let at = now();
            let since = at - Duration::minutes(RATE_WINDOW_MINUTES);
            let recent = AuditLog::count_since(conn, proposer_id, AuditAction::Propose, since)?;
            if recent >= PROPOSALS_PER_WINDOW {
                return Err(SetlistError::RateLimited {
                    limit: PROPOSALS_PER_WINDOW,
                    window_minutes: RATE_WINDOW_MINUTES,
                });
            }

            let proposal = insert(conn, NewProposalRow::new(proposer_id, &fields, at))?;
            AuditLog::append(conn, proposer_id, AuditAction::Propose, proposal.id, at)?;
            Ok(proposal)
        })?;

        tracing::info!(id = proposal.id, proposer_id, title = %proposal.title, "Proposal created");
        self.notifier.publish(ChangeEvent::ProposalCreated { id: proposal.id });
        Ok(proposal)
    }

    /// Admin shortcut: create straight into the setlist, appended at the end.
    pub fn create_approved(&self, actor: &Identity, input: ProposalInput) -> SetlistResult<Proposal> {
        require_admin(actor)?;
        let fields = input.validate()?;
        let mut conn = self.pool.get()?;

        let proposal = conn.immediate_transaction(|conn| {
            let at = now();
            let order = next_setlist_order(conn)?;
            let row = NewProposalRow {
                status: ProposalStatus::Approved.as_str(),
                setlist_order: Some(order),
                ..NewProposalRow::new(actor.user_id, &fields, at)
            };
            let proposal = insert(conn, row)?;
            AuditLog::append(conn, actor.user_id, AuditAction::AdminEdit, proposal.id, at)?;
            Ok::<_, SetlistError>(proposal)
        })?;

        tracing::info!(id = proposal.id, admin_id = actor.user_id, "Approved proposal created");
        self.notifier.publish(ChangeEvent::ProposalCreated { id: proposal.id });
        Ok(proposal)
    }

    /// Admin edit of any subset of fields.
    ///
    /// Moving into APPROVED appends to the setlist unless already there;
    /// moving out of APPROVED clears the position.
    pub fn update(&self, actor: &Identity, id: i32, patch: ProposalPatchInput) -> SetlistResult<Proposal> {
        require_admin(actor)?;
        let patch = patch.validate()?;
        let mut conn = self.pool.get()?;

        let proposal = conn.immediate_transaction(|conn| {
            let current = find(conn, id)?.ok_or_else(|| SetlistError::not_found("Proposal", id))?;
            let at = now();

            let setlist_order = match patch.status {
                Some(ProposalStatus::Approved) if current.status != ProposalStatus::Approved => {
                    Some(Some(next_setlist_order(conn)?))
                }
                Some(ProposalStatus::Approved) if current.setlist_order.is_none() => {
                    Some(Some(next_setlist_order(conn)?))
                }
                Some(ProposalStatus::Pending) | Some(ProposalStatus::Archived) => Some(None),
                _ => None,
            };

            let changes = ProposalChangeset {
                title: patch.title.as_deref(),
                artist: patch.artist.as_deref(),
                chart_url: patch.chart_url.as_ref().map(Option::as_deref),
                lyrics_url: patch.lyrics_url.as_ref().map(Option::as_deref),
                youtube_url: patch.youtube_url.as_ref().map(Option::as_deref),
                status: patch.status.map(|s| s.as_str()),
                setlist_order,
                updated_at: at,
            };

            let row = diesel::update(proposals::table.find(id))
                .set(&changes)
                .returning(ProposalRow::as_returning())
                .get_result(conn)?;
            AuditLog::append(conn, actor.user_id, AuditAction::AdminEdit, id, at)?;
            Proposal::try_from(row)
        })?;

        tracing::info!(id, admin_id = actor.user_id, status = %proposal.status, "Proposal edited");
        self.notifier.publish(ChangeEvent::ProposalUpdated { id });
        Ok(proposal)
    }

    /// Admin delete. The audit entry is written first; votes cascade.
    pub fn delete(&self, actor: &Identity, id: i32) -> SetlistResult<()> {
        require_admin(actor)?;
        let mut conn = self.pool.get()?;

        conn.immediate_transaction(|conn| {
            AuditLog::append(conn, actor.user_id, AuditAction::AdminDelete, id, now())?;
            let deleted = diesel::delete(proposals::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(SetlistError::not_found("Proposal", id));
            }
            Ok(())
        })?;

        tracing::info!(id, admin_id = actor.user_id, "Proposal deleted");
        self.notifier.publish(ChangeEvent::ProposalDeleted { id });
        Ok(())
    }

    pub fn get(&self, id: i32) -> SetlistResult<Option<Proposal>> {
        let mut conn = self.pool.get()?;
        find(&mut conn, id)
    }

    /// Every proposal, newest first.
    pub fn list_all(&self) -> SetlistResult<Vec<Proposal>> {
        let mut conn = self.pool.get()?;
        let rows = proposals::table
            .select(ProposalRow::as_select())
            .order((proposals::created_at.desc(), proposals::id.desc()))
            .load(&mut conn)?;
        rows.into_iter().map(Proposal::try_from).collect()
    }

    /// Admin overview, most recently updated first.
    pub fn list_all_by_update(&self) -> SetlistResult<Vec<ProposalSummary>> {
        let mut conn = self.pool.get()?;
        let rows = proposals::table
            .select(ProposalRow::as_select())
            .order((proposals::updated_at.desc(), proposals::id.desc()))
            .load(&mut conn)?;
        rows.into_iter()
            .map(|row| Proposal::try_from(row).map(|p| ProposalSummary::from(&p)))
            .collect()
    }

    /// Pending proposals with their vote counts, newest first.
    pub fn list_pending(&self, viewer: Option<i32>) -> SetlistResult<Vec<PendingProposal>> {
        let mut conn = self.pool.get()?;
        let threshold = self.settings.vote_threshold(&mut conn)?;

        let rows = proposals::table
            .filter(proposals::status.eq(ProposalStatus::Pending.as_str()))
            .select(ProposalRow::as_select())
            .order((proposals::created_at.desc(), proposals::id.desc()))
            .load(&mut conn)?;

        let counts: HashMap<i32, i64> = votes::table
            .inner_join(proposals::table)
            .filter(proposals::status.eq(ProposalStatus::Pending.as_str()))
            .group_by(votes::proposal_id)
            .select((votes::proposal_id, diesel::dsl::count_star()))
            .load::<(i32, i64)>(&mut conn)?
            .into_iter()
            .collect();

        let mine: HashSet<i32> = match viewer {
            Some(user_id) => votes::table
                .filter(votes::user_id.eq(user_id))
                .select(votes::proposal_id)
                .load::<i32>(&mut conn)?
                .into_iter()
                .collect(),
            None => HashSet::new(),
        };

        Ok(rows
            .into_iter()
            .map(|row| PendingProposal {
                votes: counts.get(&row.id).copied().unwrap_or(0),
                mine: mine.contains(&row.id),
                threshold,
                id: row.id,
                title: row.title,
                artist: row.artist,
                chart_url: row.chart_url,
                lyrics_url: row.lyrics_url,
                youtube_url: row.youtube_url,
            })
            .collect())
    }

    pub fn count_pending(&self) -> SetlistResult<i64> {
        let mut conn = self.pool.get()?;
        let count = proposals::table
            .filter(proposals::status.eq(ProposalStatus::Pending.as_str()))
            .count()
            .get_result(&mut conn)?;
        Ok(count)
    }

    /// The setlist: by position, unpositioned entries last, newest update first.
    pub fn list_approved(&self) -> SetlistResult<Vec<Proposal>> {
        let mut conn = self.pool.get()?;
        let rows = proposals::table
            .filter(proposals::status.eq(ProposalStatus::Approved.as_str()))
            .select(ProposalRow::as_select())
            .order((
                proposals::setlist_order.is_null().asc(),
                proposals::setlist_order.asc(),
                proposals::updated_at.desc(),
                proposals::id.desc(),
            ))
            .load(&mut conn)?;
        rows.into_iter().map(Proposal::try_from).collect()
    }
}

fn find(conn: &mut SqliteConnection, id: i32) -> SetlistResult<Option<Proposal>> {
    proposals::table
        .find(id)
        .select(ProposalRow::as_select())
        .first(conn)
        .optional()?
        .map(Proposal::try_from)
        .transpose()
}

fn insert(conn: &mut SqliteConnection, row: NewProposalRow<'_>) -> SetlistResult<Proposal> {
    let row = diesel::insert_into(proposals::table)
        .values(row)
        .returning(ProposalRow::as_returning())
        .get_result(conn)?;
    Proposal::try_from(row)
}
