//! User model and related types.

use chrono::NaiveDateTime;
use serde::Serialize;

/// A band member with access to the app (domain model).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_admin: bool,
    /// Bearer credential; never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// The resolved caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
    pub email: String,
    pub is_admin: bool,
}

/// User row for the admin user-management screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub proposals_count: i64,
    pub votes_count: i64,
    /// Whether the configured delete policy would allow removing this user.
    pub can_delete: bool,
}
