//! Authentication extractors.
//!
//! Requests identify themselves with an API key, sent either as
//! `Authorization: Bearer <key>` or as `X-Api-Key: <key>`. The key is resolved
//! through the [`IdentityGate`] in the application state.
//!
//! - [`AuthUser`]: any signed-in member, 401 otherwise.
//! - [`RequireAdmin`]: an admin, 403 for members.
//! - [`MaybeUser`]: optional identity for public pages that personalize.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::error::ApiError;
use crate::error::SetlistError;
use crate::identity::IdentityGate;
use crate::models::Identity;

/// Alternate header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Pull the API key out of the request headers, if any.
pub fn api_key_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|key| !key.is_empty())
}

fn resolve(parts: &Parts, gate: &dyn IdentityGate) -> Result<Option<Identity>, ApiError> {
    match api_key_from_headers(&parts.headers) {
        Some(key) => Ok(gate.resolve(key)?),
        None => Ok(None),
    }
}

/// A signed-in member.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn IdentityGate>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<dyn IdentityGate>::from_ref(state);
        let identity = resolve(parts, gate.as_ref())?.ok_or(SetlistError::Unauthorized)?;
        Ok(AuthUser(identity))
    }
}

/// A signed-in admin. Members are rejected with 403.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<dyn IdentityGate>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if !identity.is_admin {
            tracing::debug!(user_id = identity.user_id, "Admin route refused");
            return Err(SetlistError::Forbidden("Admin access required".into()).into());
        }
        Ok(RequireAdmin(identity))
    }
}

/// The caller if one is signed in. Unknown keys count as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Arc<dyn IdentityGate>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<dyn IdentityGate>::from_ref(state);
        Ok(MaybeUser(resolve(parts, gate.as_ref())?))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(api_key_from_headers(&headers), Some("abc123"));
    }

    #[test]
    fn test_api_key_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("  key-2 "));
        assert_eq!(api_key_from_headers(&headers), Some("key-2"));
    }

    #[test]
    fn test_missing_or_blank_key() {
        assert_eq!(api_key_from_headers(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(api_key_from_headers(&headers), None);
    }
}
