use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::User;
use crate::services::error::MatchingError;

/// PostgreSQL client owning the connection pool and the user store.
///
/// Profiles are read here; the slot counters on them are only ever
/// written through the slot ledger.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, MatchingError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MatchingError::Database(e.into()))?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, MatchingError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(url, max_connections.unwrap_or(10), min_connections.unwrap_or(1)).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch a user profile, failing if it does not exist
    pub async fn get_user(&self, user_id: &str) -> Result<User, MatchingError> {
        let query = r#"
            SELECT id, display_name, age, age_preference_min, age_preference_max,
                   community, location, interests, available_slots, total_slots_used,
                   is_active, last_active_at
            FROM users
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(user_from_row(&row)?),
            None => Err(MatchingError::UserNotFound(user_id.to_string())),
        }
    }

    /// Fetch a set of users keyed by id (used by the batch pairing pass)
    pub async fn get_users_by_ids(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<User>, MatchingError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = r#"
            SELECT id, display_name, age, age_preference_min, age_preference_max,
                   community, location, interests, available_slots, total_slots_used,
                   is_active, last_active_at
            FROM users
            WHERE id = ANY($1)
        "#;

        let rows = sqlx::query(query)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| Ok(user_from_row(row)?)).collect()
    }

    /// Candidate pool for direct matching: active users with a free slot,
    /// excluding the requester and anyone they already have an open match
    /// or pending request with, most recently active first.
    pub async fn recent_active_candidates(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<User>, MatchingError> {
        let query = r#"
            SELECT u.id, u.display_name, u.age, u.age_preference_min, u.age_preference_max,
                   u.community, u.location, u.interests, u.available_slots, u.total_slots_used,
                   u.is_active, u.last_active_at
            FROM users u
            WHERE u.id <> $1
              AND u.is_active
              AND u.available_slots > 0
              AND NOT EXISTS (
                  SELECT 1 FROM matches m
                  WHERE m.status IN ('pending', 'active')
                    AND ((m.user1_id = $1 AND m.user2_id = u.id)
                      OR (m.user2_id = $1 AND m.user1_id = u.id))
              )
              AND NOT EXISTS (
                  SELECT 1 FROM match_requests r
                  WHERE r.status = 'pending'
                    AND ((r.sender_id = $1 AND r.receiver_id = u.id)
                      OR (r.receiver_id = $1 AND r.sender_id = u.id))
              )
            ORDER BY u.last_active_at DESC
            LIMIT $2
        "#;

        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| Ok(user_from_row(row)?)).collect()
    }

    /// Refresh the activity timestamp on user-initiated operations
    pub async fn touch_last_active(&self, user_id: &str) -> Result<(), MatchingError> {
        sqlx::query("UPDATE users SET last_active_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, MatchingError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Map a `users` row to the domain struct
pub(crate) fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        age: row.try_get("age")?,
        age_preference_min: row.try_get("age_preference_min")?,
        age_preference_max: row.try_get("age_preference_max")?,
        community: row.try_get("community")?,
        location: row.try_get("location")?,
        interests: row.try_get("interests")?,
        available_slots: row.try_get("available_slots")?,
        total_slots_used: row.try_get("total_slots_used")?,
        is_active: row.try_get("is_active")?,
        last_active_at: row.try_get::<DateTime<Utc>, _>("last_active_at")?,
    })
}
