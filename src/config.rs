//! Runtime configuration shared by the server and the maintenance commands.

use clap::ValueEnum;

use crate::db::SettingsDefaults;

/// Vote threshold used until an admin stores one.
pub const DEFAULT_VOTE_THRESHOLD: i32 = 2;

/// What happens when an admin deletes a user who still owns proposals or votes.
///
/// This is a product decision left to the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum UserDeletePolicy {
    /// Delete the user together with their proposals and votes.
    #[default]
    Cascade,
    /// Refuse while the user owns proposals or votes.
    Guarded,
}

impl UserDeletePolicy {
    pub fn allows(&self, proposals: i64, votes: i64) -> bool {
        match self {
            UserDeletePolicy::Cascade => true,
            UserDeletePolicy::Guarded => proposals == 0 && votes == 0,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Threshold used while the settings row is absent.
    pub default_vote_threshold: i32,
    /// Admin emails used while the stored allowlist is empty.
    pub admin_allowlist: Vec<String>,
    /// Non-admin emails allowed to sign in.
    pub user_allowlist: Vec<String>,
    pub user_delete_policy: UserDeletePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_vote_threshold: DEFAULT_VOTE_THRESHOLD,
            admin_allowlist: Vec::new(),
            user_allowlist: Vec::new(),
            user_delete_policy: UserDeletePolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            vote_threshold: self.default_vote_threshold,
            admin_allowlist: self.admin_allowlist.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_policy() {
        assert!(UserDeletePolicy::Cascade.allows(3, 1));
        assert!(UserDeletePolicy::Guarded.allows(0, 0));
        assert!(!UserDeletePolicy::Guarded.allows(0, 1));
    }
}
