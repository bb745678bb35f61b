//! System handlers.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::blocking;
use crate::api::auth::RequireAdmin;
use crate::api::error::ApiResult;
use crate::api::extract::ApiQuery;
use crate::api::state::AppState;
use crate::models::AuditEntry;

const MAX_AUDIT_ENTRIES: i64 = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    /// Open change streams.
    pub listeners: usize,
}

/// GET /health
///
/// Liveness probe. Does not touch the database.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        listeners: state.notifier.listener_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

/// GET /admin/audit
///
/// Most recent audit entries, newest first.
pub async fn list_audit(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let audit = state.audit.clone();
    let limit = query.limit.clamp(1, MAX_AUDIT_ENTRIES);
    Ok(Json(blocking(move || audit.recent(limit)).await?))
}
