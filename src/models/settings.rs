//! Global settings singleton.

use serde::Serialize;

/// Stored settings, with the configured threshold when no row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub vote_threshold: i32,
    pub admin_allowlist: Vec<String>,
}
