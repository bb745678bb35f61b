//! Settings store: the vote threshold and the admin allowlist.

use std::sync::Arc;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::DbPool;
use crate::db::schema::settings;
use crate::error::{SetlistError, SetlistResult};
use crate::models::Settings;

/// The settings row always has this id.
const SETTINGS_ID: i32 = 1;

/// Database row representation for the settings singleton.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SettingsRow {
    pub id: i32,
    pub vote_threshold: i32,
    /// JSON array of email strings.
    pub admin_allowlist: String,
}

/// Values used while no settings row has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDefaults {
    pub vote_threshold: i32,
    pub admin_allowlist: Vec<String>,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            vote_threshold: crate::config::DEFAULT_VOTE_THRESHOLD,
            admin_allowlist: Vec::new(),
        }
    }
}

/// Validated settings write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub vote_threshold: i32,
    /// `None` leaves the stored allowlist untouched.
    pub admin_allowlist: Option<Vec<String>>,
}

impl SettingsUpdate {
    pub fn new(vote_threshold: i64, admin_allowlist: Option<Vec<String>>) -> SetlistResult<Self> {
        let vote_threshold = i32::try_from(vote_threshold)
            .ok()
            .filter(|t| *t >= 1)
            .ok_or_else(|| SetlistError::validation("Bad threshold"))?;

        let admin_allowlist = admin_allowlist.map(|emails| {
            emails
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect()
        });

        Ok(Self {
            vote_threshold,
            admin_allowlist,
        })
    }
}

/// Read-mostly access to the settings singleton.
#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
    defaults: Arc<SettingsDefaults>,
}

impl SettingsStore {
    pub fn new(pool: DbPool, defaults: SettingsDefaults) -> Self {
        Self {
            pool,
            defaults: Arc::new(defaults),
        }
    }

    /// Effective settings.
    pub fn get(&self) -> SetlistResult<Settings> {
        let mut conn = self.pool.get()?;
        self.load(&mut conn)
    }

    /// Settings read on an existing connection (possibly inside a transaction).
    ///
    /// Without a stored row the threshold falls back to the configured one and
    /// the allowlist is empty. The configured allowlist is never exposed here.
    pub fn load(&self, conn: &mut SqliteConnection) -> SetlistResult<Settings> {
        let row = settings::table
            .filter(settings::id.eq(SETTINGS_ID))
            .select(SettingsRow::as_select())
            .first(conn)
            .optional()?;

        let Some(row) = row else {
            return Ok(Settings {
                vote_threshold: self.defaults.vote_threshold,
                admin_allowlist: Vec::new(),
            });
        };

        let admin_allowlist: Vec<String> = serde_json::from_str(&row.admin_allowlist)
            .map_err(|e| SetlistError::Corrupt(format!("settings.admin_allowlist: {e}")))?;

        Ok(Settings {
            vote_threshold: row.vote_threshold,
            admin_allowlist,
        })
    }

    /// Admin allowlist used for sign-in: the stored one, or the configured one
    /// while nothing is stored.
    pub fn effective_admin_allowlist(&self) -> SetlistResult<Vec<String>> {
        let stored = self.get()?.admin_allowlist;
        if stored.is_empty() {
            Ok(self.defaults.admin_allowlist.clone())
        } else {
            Ok(stored)
        }
    }

    /// Current vote threshold.
    pub fn vote_threshold(&self, conn: &mut SqliteConnection) -> SetlistResult<i32> {
        Ok(self.load(conn)?.vote_threshold)
    }

    /// Write the settings row, creating it on first use. Last write wins.
    pub fn update(&self, update: &SettingsUpdate) -> SetlistResult<Settings> {
        let mut conn = self.pool.get()?;

        conn.immediate_transaction(|conn| {
            let existing = settings::table
                .filter(settings::id.eq(SETTINGS_ID))
                .select(SettingsRow::as_select())
                .first(conn)
                .optional()?;

            let allowlist_json = match (&update.admin_allowlist, &existing) {
                (Some(list), _) => encode_allowlist(list)?,
                (None, Some(row)) => row.admin_allowlist.clone(),
                (None, None) => "[]".to_string(),
            };

            if existing.is_some() {
                diesel::update(settings::table.filter(settings::id.eq(SETTINGS_ID)))
                    .set((
                        settings::vote_threshold.eq(update.vote_threshold),
                        settings::admin_allowlist.eq(&allowlist_json),
                    ))
                    .execute(conn)?;
            } else {
                diesel::insert_into(settings::table)
                    .values(SettingsRow {
                        id: SETTINGS_ID,
                        vote_threshold: update.vote_threshold,
                        admin_allowlist: allowlist_json,
                    })
                    .execute(conn)?;
            }

            self.load(conn)
        })
    }
}

fn encode_allowlist(list: &[String]) -> SetlistResult<String> {
    serde_json::to_string(list)
        .map_err(|e| SetlistError::Corrupt(format!("settings.admin_allowlist: {e}")))
}
