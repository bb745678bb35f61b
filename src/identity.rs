//! Identity resolution and sign-in gating.
//!
//! The identity provider is external: it hands us a verified email, and
//! [`IdentityGate::admit`] decides whether that email may use the app. Admitted
//! users receive an API key, which later requests present as a bearer
//! credential and [`IdentityGate::resolve`] maps back to an [`Identity`].

use crate::config::AppConfig;
use crate::db::{NewUser, SettingsStore, UserRepository};
use crate::error::{SetlistError, SetlistResult};
use crate::models::{Identity, User};
use crate::setlist::validate_email;

/// Outcome of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: User,
    pub api_key: String,
    /// Whether the user row was created by this sign-in.
    pub created: bool,
}

/// Identity operations the HTTP layer depends on.
pub trait IdentityGate: Send + Sync + 'static {
    /// Map an API key to the caller it belongs to.
    fn resolve(&self, api_key: &str) -> SetlistResult<Option<Identity>>;

    /// Admit a verified email, creating the user on first sign-in.
    fn admit(&self, email: &str, name: Option<&str>, image: Option<&str>) -> SetlistResult<SignIn>;
}

/// Identity gate backed by the users table and the stored settings.
#[derive(Clone)]
pub struct DatabaseIdentityGate {
    users: UserRepository,
    settings: SettingsStore,
    user_allowlist: Vec<String>,
}

impl DatabaseIdentityGate {
    pub fn new(users: UserRepository, settings: SettingsStore, config: &AppConfig) -> Self {
        Self {
            users,
            settings,
            user_allowlist: config.user_allowlist.clone(),
        }
    }

    fn is_member_email(&self, email: &str) -> bool {
        self.user_allowlist
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(email))
    }
}

impl IdentityGate for DatabaseIdentityGate {
    fn resolve(&self, api_key: &str) -> SetlistResult<Option<Identity>> {
        if api_key.is_empty() {
            return Ok(None);
        }
        Ok(self.users.find_by_api_key(api_key)?.map(|u| u.identity()))
    }

    fn admit(&self, email: &str, name: Option<&str>, image: Option<&str>) -> SetlistResult<SignIn> {
        let email = validate_email(email)?;

        let is_admin_email = self
            .settings
            .effective_admin_allowlist()?
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(&email));
        if !is_admin_email && !self.is_member_email(&email) {
            tracing::warn!(%email, "Sign-in refused: email not on any allowlist");
            return Err(SetlistError::Forbidden(format!("{email} is not allowed to sign in")));
        }

        let (user, created) = match self.users.find_by_email(&email)? {
            Some(user) => (user, false),
            None => {
                let new_user = NewUser {
                    is_admin: is_admin_email,
                    ..NewUser::regular(&email)
                }
                .with_name(name)
                .with_image(image);
                let user = self.users.create(&new_user)?;
                tracing::info!(user_id = user.id, %email, is_admin = user.is_admin, "User created on first sign-in");
                (user, true)
            }
        };

        let api_key = match &user.api_key {
            Some(key) => key.clone(),
            None => self.users.generate_api_key(user.id)?,
        };

        Ok(SignIn {
            user,
            api_key,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbPool, SettingsDefaults, SettingsUpdate, testing};

    fn gate(pool: &DbPool, admins: &[&str], members: &[&str]) -> DatabaseIdentityGate {
        let config = AppConfig {
            admin_allowlist: admins.iter().map(|s| s.to_string()).collect(),
            user_allowlist: members.iter().map(|s| s.to_string()).collect(),
            ..AppConfig::default()
        };
        DatabaseIdentityGate::new(
            UserRepository::new(pool.clone()),
            SettingsStore::new(pool.clone(), config.settings_defaults()),
            &config,
        )
    }

    #[test]
    fn test_admit_gates_by_allowlists() {
        let pool = testing::pool();
        let gate = gate(&pool, &["lead@band.com"], &["drums@band.com"]);

        let admin = gate.admit("Lead@Band.com", Some("Lead"), None).unwrap();
        assert!(admin.created);
        assert!(admin.user.is_admin);
        assert_eq!(admin.user.email, "lead@band.com");

        let member = gate.admit("drums@band.com", None, None).unwrap();
        assert!(!member.user.is_admin);

        assert!(matches!(
            gate.admit("stranger@example.com", None, None),
            Err(SetlistError::Forbidden(_))
        ));
        assert!(matches!(gate.admit("not-an-email", None, None), Err(SetlistError::Validation(_))));
    }

    #[test]
    fn test_repeat_sign_in_keeps_key() {
        let pool = testing::pool();
        let gate = gate(&pool, &[], &["bass@band.com"]);

        let first = gate.admit("bass@band.com", None, None).unwrap();
        let second = gate.admit("bass@band.com", None, None).unwrap();
        assert!(!second.created);
        assert_eq!(first.api_key, second.api_key);

        let identity = gate.resolve(&first.api_key).unwrap().unwrap();
        assert_eq!(identity.user_id, first.user.id);
        assert!(gate.resolve("bogus").unwrap().is_none());
        assert!(gate.resolve("").unwrap().is_none());
    }

    #[test]
    fn test_stored_allowlist_overrides_env() {
        let pool = testing::pool();
        let gate = gate(&pool, &["env@band.com"], &[]);
        SettingsStore::new(pool.clone(), SettingsDefaults::default())
            .update(&SettingsUpdate::new(2, Some(vec!["stored@band.com".into()])).unwrap())
            .unwrap();

        assert!(gate.admit("stored@band.com", None, None).unwrap().user.is_admin);
        assert!(gate.admit("env@band.com", None, None).is_err());
    }
}
