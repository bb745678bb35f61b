//! Database repository for user operations.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::config::UserDeletePolicy;
use crate::db::schema::{proposals, users, votes};
use crate::db::{DbPool, now};
use crate::error::{SetlistError, SetlistResult};
use crate::models::{User, UserSummary};

/// Database row representation for users.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_admin: bool,
    pub api_key: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            image: row.image,
            is_admin: row.is_admin,
            api_key: row.api_key,
            created_at: row.created_at,
        }
    }
}

/// Data for inserting a new user.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub image: Option<&'a str>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

impl<'a> NewUser<'a> {
    /// Create a new admin user.
    pub fn admin(email: &'a str) -> Self {
        Self {
            email,
            name: None,
            image: None,
            is_admin: true,
            created_at: now(),
        }
    }

    /// Create a new regular member.
    pub fn regular(email: &'a str) -> Self {
        Self {
            is_admin: false,
            ..Self::admin(email)
        }
    }

    pub fn with_name(mut self, name: Option<&'a str>) -> Self {
        self.name = name;
        self
    }

    pub fn with_image(mut self, image: Option<&'a str>) -> Self {
        self.image = image;
        self
    }
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a user by email (case-insensitive).
    pub fn find_by_email(&self, email: &str) -> SetlistResult<Option<User>> {
        let mut conn = self.pool.get()?;

        let result = users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(result.map(User::from))
    }

    /// Find a user by ID.
    pub fn find_by_id(&self, user_id: i32) -> SetlistResult<Option<User>> {
        let mut conn = self.pool.get()?;

        let result = users::table
            .filter(users::id.eq(user_id))
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(result.map(User::from))
    }

    /// Find a user by API key.
    pub fn find_by_api_key(&self, api_key: &str) -> SetlistResult<Option<User>> {
        let mut conn = self.pool.get()?;

        let result = users::table
            .filter(users::api_key.eq(api_key))
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(result.map(User::from))
    }

    /// Create a new user. Emails are stored lowercased.
    pub fn create(&self, new_user: &NewUser) -> SetlistResult<User> {
        let mut conn = self.pool.get()?;
        let email = new_user.email.trim().to_lowercase();

        conn.immediate_transaction(|conn| {
            let existing = users::table
                .filter(users::email.eq(&email))
                .count()
                .get_result::<i64>(conn)?;

            if existing > 0 {
                return Err(SetlistError::Conflict(format!("Email already exists: {email}")));
            }

            let row = diesel::insert_into(users::table)
                .values(NewUser {
                    email: &email,
                    ..new_user.clone()
                })
                .returning(UserRow::as_returning())
                .get_result(conn)?;

            Ok(User::from(row))
        })
    }

    /// Create the user, or update name and admin flag when the email exists.
    pub fn upsert(&self, email: &str, name: Option<&str>, is_admin: bool) -> SetlistResult<User> {
        let mut conn = self.pool.get()?;
        let email = email.trim().to_lowercase();

        conn.immediate_transaction(|conn| {
            let existing = users::table
                .filter(users::email.eq(&email))
                .select(users::id)
                .first::<i32>(conn)
                .optional()?;

            let row = match existing {
                Some(id) => diesel::update(users::table.filter(users::id.eq(id)))
                    .set((users::name.eq(name), users::is_admin.eq(is_admin)))
                    .returning(UserRow::as_returning())
                    .get_result(conn)?,
                None => diesel::insert_into(users::table)
                    .values(NewUser {
                        email: &email,
                        name,
                        image: None,
                        is_admin,
                        created_at: now(),
                    })
                    .returning(UserRow::as_returning())
                    .get_result(conn)?,
            };

            Ok(User::from(row))
        })
    }

    /// Grant or revoke admin rights.
    pub fn set_admin(&self, user_id: i32, is_admin: bool) -> SetlistResult<User> {
        let mut conn = self.pool.get()?;

        let row = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set(users::is_admin.eq(is_admin))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .optional()?;

        row.map(User::from)
            .ok_or_else(|| SetlistError::not_found("User", user_id))
    }

    /// Get all users with their activity counts, newest first.
    pub fn find_all_with_counts(&self, policy: UserDeletePolicy) -> SetlistResult<Vec<UserSummary>> {
        let mut conn = self.pool.get()?;

        let rows = users::table
            .select(UserRow::as_select())
            .order((users::created_at.desc(), users::id.desc()))
            .load(&mut conn)?;

        let proposal_counts: HashMap<i32, i64> = proposals::table
            .group_by(proposals::proposer_id)
            .select((proposals::proposer_id, diesel::dsl::count_star()))
            .load::<(i32, i64)>(&mut conn)?
            .into_iter()
            .collect();

        let vote_counts: HashMap<i32, i64> = votes::table
            .group_by(votes::user_id)
            .select((votes::user_id, diesel::dsl::count_star()))
            .load::<(i32, i64)>(&mut conn)?
            .into_iter()
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let proposals_count = proposal_counts.get(&row.id).copied().unwrap_or(0);
                let votes_count = vote_counts.get(&row.id).copied().unwrap_or(0);
                UserSummary {
                    id: row.id,
                    name: row.name,
                    email: row.email,
                    image: row.image,
                    is_admin: row.is_admin,
                    created_at: row.created_at,
                    proposals_count,
                    votes_count,
                    can_delete: policy.allows(proposals_count, votes_count),
                }
            })
            .collect())
    }

    /// Delete a user by ID according to the deployment's delete policy.
    ///
    /// Under [`UserDeletePolicy::Cascade`] the user's proposals and votes go
    /// with them; under [`UserDeletePolicy::Guarded`] the delete is refused
    /// while any exist.
    pub fn delete(&self, user_id: i32, policy: UserDeletePolicy) -> SetlistResult<()> {
        let mut conn = self.pool.get()?;

        conn.immediate_transaction(|conn| {
            if policy == UserDeletePolicy::Guarded {
                let owned_proposals = proposals::table
                    .filter(proposals::proposer_id.eq(user_id))
                    .count()
                    .get_result::<i64>(conn)?;
                let owned_votes = votes::table
                    .filter(votes::user_id.eq(user_id))
                    .count()
                    .get_result::<i64>(conn)?;

                if !policy.allows(owned_proposals, owned_votes) {
                    return Err(SetlistError::Conflict(format!(
                        "User {user_id} still has {owned_proposals} proposals and {owned_votes} votes"
                    )));
                }
            }

            let deleted = diesel::delete(users::table.filter(users::id.eq(user_id))).execute(conn)?;
            if deleted == 0 {
                return Err(SetlistError::not_found("User", user_id));
            }
            Ok(())
        })
    }

    /// Check if any users exist in the database.
    pub fn has_users(&self) -> SetlistResult<bool> {
        let mut conn = self.pool.get()?;

        let count = users::table.count().get_result::<i64>(&mut conn)?;

        Ok(count > 0)
    }

    /// Set or clear a user's API key.
    pub fn set_api_key(&self, user_id: i32, api_key: Option<&str>) -> SetlistResult<bool> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set(users::api_key.eq(api_key))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    /// Generate a new API key for a user, replacing any previous one.
    /// Returns the generated API key.
    pub fn generate_api_key(&self, user_id: i32) -> SetlistResult<String> {
        use rand_core::{OsRng, RngCore};

        // Generate a random 32-byte key and encode as hex (64 characters)
        let mut key_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let api_key = hex::encode(key_bytes);

        if !self.set_api_key(user_id, Some(&api_key))? {
            return Err(SetlistError::not_found("User", user_id));
        }
        Ok(api_key)
    }

    /// Revoke a user's API key.
    pub fn revoke_api_key(&self, user_id: i32) -> SetlistResult<bool> {
        self.set_api_key(user_id, None)
    }
}
