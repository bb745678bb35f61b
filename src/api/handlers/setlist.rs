//! Setlist ordering and settings handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::blocking;
use crate::api::auth::RequireAdmin;
use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::db::SettingsUpdate;
use crate::error::SetlistError;
use crate::models::Settings;

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub ok: bool,
}

/// PATCH /setlist/reorder
///
/// Body `{"ids": [...]}`: approved proposals in their new order.
pub async fn reorder_setlist(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<ReorderRequest>,
) -> ApiResult<Json<ReorderResponse>> {
    let ordering = state.ordering.clone();
    blocking(move || ordering.reorder(&admin, &body.ids)).await?;
    Ok(Json(ReorderResponse { ok: true }))
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    let settings = state.settings.clone();
    Ok(Json(blocking(move || settings.get()).await?))
}

/// Loosely typed settings body: the threshold may arrive as a number or a
/// numeric string, allowlist entries as any JSON scalar.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub vote_threshold: Value,
    pub admin_allowlist: Option<Value>,
}

impl SettingsPatch {
    pub fn into_update(self) -> Result<SettingsUpdate, SetlistError> {
        let threshold = match &self.vote_threshold {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| SetlistError::validation("Bad threshold"))?;

        let allowlist = match self.admin_allowlist {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            _ => None,
        };

        SettingsUpdate::new(threshold, allowlist)
    }
}

/// PATCH /settings
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<SettingsPatch>,
) -> ApiResult<StatusCode> {
    let update = body.into_update()?;
    let settings = state.settings.clone();
    let saved = blocking(move || settings.update(&update)).await?;
    tracing::info!(
        admin_id = admin.user_id,
        vote_threshold = saved.vote_threshold,
        "Settings updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
