//! User management handlers (admin only).

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::blocking;
use crate::api::auth::RequireAdmin;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::models::{User, UserSummary};
use crate::setlist::validate_email;

/// GET /admin/users
///
/// Every user with their activity counts, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state.users.clone();
    let policy = state.config.user_delete_policy;
    Ok(Json(blocking(move || users.find_all_with_counts(policy)).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
}

/// POST /admin/users
///
/// Create a user or update name and admin flag of an existing one.
pub async fn upsert_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<UpsertUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let email = validate_email(&body.email)?;
    let name = body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let users = state.users.clone();
    let is_admin = body.is_admin;

    let user = blocking(move || users.upsert(&email, name.as_deref(), is_admin)).await?;
    tracing::info!(admin_id = admin.user_id, user_id = user.id, is_admin, "User upserted");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: Option<bool>,
}

/// PATCH /admin/users/{id}
pub async fn set_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<SetAdminRequest>,
) -> ApiResult<Json<User>> {
    let is_admin = body
        .is_admin
        .ok_or_else(|| ApiError::BadRequest("Missing isAdmin boolean".into()))?;
    let users = state.users.clone();

    let user = blocking(move || users.set_admin(id, is_admin)).await?;
    tracing::info!(admin_id = admin.user_id, user_id = id, is_admin, "Admin flag changed");
    Ok(Json(user))
}

/// DELETE /admin/users/{id}
///
/// Follows the configured delete policy.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    let users = state.users.clone();
    let policy = state.config.user_delete_policy;

    blocking(move || users.delete(id, policy)).await?;
    tracing::info!(admin_id = admin.user_id, user_id = id, ?policy, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub user_id: i32,
    pub api_key: String,
}

/// POST /admin/users/{id}/api-key
///
/// Issue a new API key, replacing the previous one.
pub async fn issue_api_key(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<ApiKeyResponse>> {
    let users = state.users.clone();
    let api_key = blocking(move || users.generate_api_key(id)).await?;
    tracing::info!(admin_id = admin.user_id, user_id = id, "API key issued");
    Ok(Json(ApiKeyResponse { user_id: id, api_key }))
}
