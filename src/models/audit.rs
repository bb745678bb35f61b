//! Audit trail entries.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

/// State-changing actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Propose,
    Vote,
    Unvote,
    AdminEdit,
    AdminDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Propose => "PROPOSE",
            AuditAction::Vote => "VOTE",
            AuditAction::Unvote => "UNVOTE",
            AuditAction::AdminEdit => "ADMIN_EDIT",
            AuditAction::AdminDelete => "ADMIN_DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSE" => Ok(AuditAction::Propose),
            "VOTE" => Ok(AuditAction::Vote),
            "UNVOTE" => Ok(AuditAction::Unvote),
            "ADMIN_EDIT" => Ok(AuditAction::AdminEdit),
            "ADMIN_DELETE" => Ok(AuditAction::AdminDelete),
            other => Err(format!("unknown audit action '{other}'")),
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i32,
    pub user_id: i32,
    pub action: AuditAction,
    pub target_id: i32,
    pub created_at: NaiveDateTime,
}
