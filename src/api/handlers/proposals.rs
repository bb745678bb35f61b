//! Proposal and vote handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::{Created, blocking};
use crate::api::auth::{AuthUser, MaybeUser, RequireAdmin};
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::error::SetlistError;
use crate::models::{PendingProposal, Proposal, ProposalSummary};
use crate::setlist::{ProposalInput, ProposalPatchInput};

/// Admin detail view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub votes: i64,
}

#[derive(Debug, Serialize)]
pub struct PendingCount {
    pub count: i64,
}

/// POST /proposals
///
/// Propose a song. Starts PENDING; limited per member per hour.
pub async fn create_proposal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(input): ApiJson<ProposalInput>,
) -> ApiResult<Json<Created>> {
    let proposals = state.proposals.clone();
    let proposal = blocking(move || proposals.create(user.user_id, input)).await?;
    Ok(Json(Created { id: proposal.id }))
}

/// GET /proposals
pub async fn list_proposals(State(state): State<AppState>) -> ApiResult<Json<Vec<Proposal>>> {
    let proposals = state.proposals.clone();
    Ok(Json(blocking(move || proposals.list_all()).await?))
}

/// GET /proposals/pending
///
/// `mine` is only ever true for a signed-in caller.
pub async fn list_pending(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Json<Vec<PendingProposal>>> {
    let proposals = state.proposals.clone();
    let viewer = viewer.map(|v| v.user_id);
    Ok(Json(blocking(move || proposals.list_pending(viewer)).await?))
}

/// GET /proposals/pending/count
pub async fn pending_count(State(state): State<AppState>) -> ApiResult<Json<PendingCount>> {
    let proposals = state.proposals.clone();
    let count = blocking(move || proposals.count_pending()).await?;
    Ok(Json(PendingCount { count }))
}

/// GET /proposals/approved
pub async fn list_approved(State(state): State<AppState>) -> ApiResult<Json<Vec<Proposal>>> {
    let proposals = state.proposals.clone();
    Ok(Json(blocking(move || proposals.list_approved()).await?))
}

/// GET /proposals/all
pub async fn list_by_update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<ProposalSummary>>> {
    let proposals = state.proposals.clone();
    Ok(Json(blocking(move || proposals.list_all_by_update()).await?))
}

/// POST /proposals/{id}/vote
pub async fn cast_vote(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    let votes = state.votes.clone();
    blocking(move || votes.cast_vote(user.user_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /proposals/{id}/vote
pub async fn retract_vote(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    let votes = state.votes.clone();
    blocking(move || votes.retract_vote(user.user_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /proposals/{id}
pub async fn get_proposal(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ProposalDetail>> {
    let proposals = state.proposals.clone();
    let ledger = state.votes.clone();
    let detail = blocking(move || {
        let proposal = proposals
            .get(id)?
            .ok_or_else(|| SetlistError::not_found("Proposal", id))?;
        let votes = ledger.count_votes(id)?;
        Ok(ProposalDetail { proposal, votes })
    })
    .await?;
    Ok(Json(detail))
}

/// PATCH /proposals/{id}
pub async fn update_proposal(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
    ApiJson(patch): ApiJson<ProposalPatchInput>,
) -> ApiResult<StatusCode> {
    let proposals = state.proposals.clone();
    blocking(move || proposals.update(&admin, id, patch)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /proposals/{id}
pub async fn delete_proposal(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    let proposals = state.proposals.clone();
    blocking(move || proposals.delete(&admin, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/proposals
///
/// Add a song straight to the end of the setlist.
pub async fn create_approved(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(input): ApiJson<ProposalInput>,
) -> ApiResult<Json<Created>> {
    let proposals = state.proposals.clone();
    let proposal = blocking(move || proposals.create_approved(&admin, input)).await?;
    Ok(Json(Created { id: proposal.id }))
}

/// GET /admin/proposals
pub async fn admin_list_proposals(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<Proposal>>> {
    list_proposals(State(state)).await
}
