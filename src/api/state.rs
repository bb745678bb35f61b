//! Application state shared across all handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::AppConfig;
use crate::db::{AuditLog, DbPool, SettingsStore, UserRepository};
use crate::events::ChangeNotifier;
use crate::identity::{DatabaseIdentityGate, IdentityGate};
use crate::setlist::{ProposalRepository, PromotionEngine, SetlistOrdering, VoteLedger};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub notifier: Arc<ChangeNotifier>,
    pub identity: Arc<dyn IdentityGate>,
    pub users: UserRepository,
    pub settings: SettingsStore,
    pub proposals: ProposalRepository,
    pub votes: VoteLedger,
    pub ordering: SetlistOrdering,
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let notifier = Arc::new(ChangeNotifier::default());
        let settings = SettingsStore::new(pool.clone(), config.settings_defaults());
        let users = UserRepository::new(pool.clone());
        let promotion = PromotionEngine::new(pool.clone(), settings.clone(), notifier.clone());

        Self {
            identity: Arc::new(DatabaseIdentityGate::new(users.clone(), settings.clone(), &config)),
            proposals: ProposalRepository::new(pool.clone(), settings.clone(), notifier.clone()),
            votes: VoteLedger::new(pool.clone(), promotion, notifier.clone()),
            ordering: SetlistOrdering::new(pool.clone(), notifier.clone()),
            audit: AuditLog::new(pool),
            config: Arc::new(config),
            notifier,
            users,
            settings,
        }
    }
}

// Allow extracting Arc<dyn IdentityGate> from AppState
impl FromRef<AppState> for Arc<dyn IdentityGate> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
