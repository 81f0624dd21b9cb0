use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MatchingSettings;
use crate::core::starters::StarterDeck;
use crate::core::{mutual_age_compatible, score_compatibility};
use crate::events::{DomainEvent, EventBus};
use crate::models::{Match, MatchStatus, User};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::error::MatchingError;
use crate::services::postgres::PostgresClient;
use crate::services::queue::QueueManager;
use crate::services::slots::SlotLedger;

/// Result of a match request: an immediate pair, or a hand-off to the queue.
#[derive(Debug)]
pub enum MatchOutcome {
    Matched(Match),
    Queued {
        position: i64,
        estimated_wait_secs: i64,
    },
}

/// On-demand pairing: direct targeting and pool search, with queue
/// fail-over when no candidate clears the compatibility threshold.
pub struct MatchingService {
    pool: PgPool,
    users: Arc<PostgresClient>,
    cache: Arc<CacheManager>,
    queue: Arc<QueueManager>,
    events: EventBus,
    starters: Arc<StarterDeck>,
    settings: MatchingSettings,
    max_slots: i32,
}

impl MatchingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<PostgresClient>,
        cache: Arc<CacheManager>,
        queue: Arc<QueueManager>,
        events: EventBus,
        starters: Arc<StarterDeck>,
        settings: MatchingSettings,
        max_slots: i32,
    ) -> Self {
        Self {
            pool: users.pool().clone(),
            users,
            cache,
            queue,
            events,
            starters,
            settings,
            max_slots,
        }
    }

    /// Request a match. With a target this proposes a pending pair to a
    /// specific user; without one it searches the active pool and falls
    /// over to the queue when nothing clears the threshold.
    pub async fn request_match(
        &self,
        user_id: &str,
        target_user_id: Option<&str>,
    ) -> Result<MatchOutcome, MatchingError> {
        match target_user_id {
            Some(target) => self
                .request_targeted(user_id, target)
                .await
                .map(MatchOutcome::Matched),
            None => self.request_from_pool(user_id).await,
        }
    }

    /// Propose a pending match against a specific target.
    async fn request_targeted(
        &self,
        user_id: &str,
        target_user_id: &str,
    ) -> Result<Match, MatchingError> {
        if user_id == target_user_id {
            return Err(MatchingError::SelfPairing);
        }

        let user = self.users.get_user(user_id).await?;
        let target = self.users.get_user(target_user_id).await?;

        self.ensure_no_open_link(user_id, target_user_id).await?;

        let score =
            compatibility_between(&self.cache, &user, &target, self.settings.max_score).await;

        let now = Utc::now();
        let proposed = Match {
            id: Uuid::new_v4(),
            user1_id: user.id.clone(),
            user2_id: target.id.clone(),
            status: MatchStatus::Pending,
            compatibility_score: score,
            conversation_starter: None,
            created_at: now,
            expires_at: Some(now + Duration::hours(self.settings.pending_match_ttl_hours)),
        };

        let mut tx = self.pool.begin().await?;
        if !SlotLedger::reserve_on(&mut *tx, user_id).await? {
            return Err(MatchingError::NoAvailableSlots(user_id.to_string()));
        }
        insert_match(&mut *tx, &proposed).await?;
        tx.commit().await?;

        if let Err(e) = self.users.touch_last_active(user_id).await {
            tracing::warn!("Failed to touch last_active for {}: {}", user_id, e);
        }

        self.publish_created(&proposed);
        tracing::info!(
            "Created pending match {} between {} and {} (score {})",
            proposed.id,
            user_id,
            target_user_id,
            score
        );

        Ok(proposed)
    }

    /// Search the active pool for the best compatible candidate.
    ///
    /// The requester's slot is only consumed once a concrete pair forms;
    /// a fruitless search costs nothing and ends in the queue.
    async fn request_from_pool(&self, user_id: &str) -> Result<MatchOutcome, MatchingError> {
        let user = self.users.get_user(user_id).await?;
        if !user.has_available_slot() {
            return Err(MatchingError::NoAvailableSlots(user_id.to_string()));
        }

        if let Err(e) = self.users.touch_last_active(user_id).await {
            tracing::warn!("Failed to touch last_active for {}: {}", user_id, e);
        }

        let candidates = self
            .users
            .recent_active_candidates(user_id, self.settings.candidate_pool_size)
            .await?;
        let pool_size = candidates.len();

        let mut ranked: Vec<(User, i32)> = Vec::new();
        for candidate in candidates
            .into_iter()
            .filter(|c| mutual_age_compatible(&user, c))
        {
            let score =
                compatibility_between(&self.cache, &user, &candidate, self.settings.max_score)
                    .await;
            if score >= self.settings.min_compatibility {
                ranked.push((candidate, score));
            }
        }

        // Highest score first; recency breaks ties
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.0.last_active_at.cmp(&a.0.last_active_at))
        });
        ranked.truncate(self.settings.top_candidates);

        tracing::debug!(
            "Pool search for {}: {} candidates, {} above threshold",
            user_id,
            pool_size,
            ranked.len()
        );

        for (candidate, score) in &ranked {
            if let Some(matched) = self.try_pair(&user.id, &candidate.id, *score).await? {
                return Ok(MatchOutcome::Matched(matched));
            }
        }

        // Nothing pairable right now; the queue picks this user up
        let status = self.queue.enqueue(user_id, None).await?;
        tracing::info!("No immediate match for {}, queued", user_id);
        Ok(MatchOutcome::Queued {
            position: status.position.unwrap_or(1),
            estimated_wait_secs: status.estimated_wait_secs.unwrap_or(0),
        })
    }

    /// Reserve both slots and insert an active match in one transaction.
    /// Returns None when the candidate's last slot was claimed elsewhere,
    /// so the caller can move on to the next candidate.
    async fn try_pair(
        &self,
        user_id: &str,
        candidate_id: &str,
        score: i32,
    ) -> Result<Option<Match>, MatchingError> {
        let matched = Match {
            id: Uuid::new_v4(),
            user1_id: user_id.to_string(),
            user2_id: candidate_id.to_string(),
            status: MatchStatus::Active,
            compatibility_score: score,
            conversation_starter: Some(self.starters.draw().to_string()),
            created_at: Utc::now(),
            expires_at: None,
        };

        let mut tx = self.pool.begin().await?;
        if !SlotLedger::reserve_on(&mut *tx, user_id).await? {
            // The requester's own slot disappeared mid-search
            return Err(MatchingError::NoAvailableSlots(user_id.to_string()));
        }
        if !SlotLedger::reserve_on(&mut *tx, candidate_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        insert_match(&mut *tx, &matched).await?;
        tx.commit().await?;

        self.publish_created(&matched);
        tracing::info!(
            "Paired {} with {} from the pool (score {})",
            user_id,
            candidate_id,
            score
        );

        Ok(Some(matched))
    }

    /// All matches the user participates in, newest first
    pub async fn get_user_matches(&self, user_id: &str) -> Result<Vec<Match>, MatchingError> {
        self.users.get_user(user_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user1_id, user2_id, status, compatibility_score,
                   conversation_starter, created_at, expires_at
            FROM matches
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| Ok(match_from_row(row)?)).collect()
    }

    /// Single match, visible only to its participants
    pub async fn get_match_details(
        &self,
        match_id: Uuid,
        user_id: &str,
    ) -> Result<Match, MatchingError> {
        let row = sqlx::query(
            r#"
            SELECT id, user1_id, user2_id, status, compatibility_score,
                   conversation_starter, created_at, expires_at
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        let matched = match row {
            Some(row) => match_from_row(&row)?,
            None => return Err(MatchingError::MatchNotFound(match_id)),
        };

        if !matched.involves(user_id) {
            return Err(MatchingError::NotParticipant {
                user_id: user_id.to_string(),
                match_id,
            });
        }

        Ok(matched)
    }

    /// Accept a pending match. Only the invited side may accept, and
    /// accepting consumes one of their slots.
    pub async fn accept_match(
        &self,
        match_id: Uuid,
        user_id: &str,
    ) -> Result<Match, MatchingError> {
        let mut tx = self.pool.begin().await?;
        let matched = lock_match(&mut tx, match_id).await?;

        if !matched.involves(user_id) {
            return Err(MatchingError::NotParticipant {
                user_id: user_id.to_string(),
                match_id,
            });
        }
        if matched.status != MatchStatus::Pending {
            return Err(MatchingError::MatchNotPending(match_id));
        }
        if user_id != matched.user2_id {
            return Err(MatchingError::NotMatchRecipient(match_id));
        }

        let now = Utc::now();
        if matched.expires_at.is_some_and(|at| at <= now) {
            self.expire_pending_match(&mut tx, &matched).await?;
            tx.commit().await?;
            return Err(MatchingError::MatchNotPending(match_id));
        }

        if !SlotLedger::reserve_on(&mut *tx, user_id).await? {
            return Err(MatchingError::NoAvailableSlots(user_id.to_string()));
        }
        sqlx::query("UPDATE matches SET status = 'active', expires_at = NULL WHERE id = $1")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Match {} accepted by {}", match_id, user_id);

        Ok(Match {
            status: MatchStatus::Active,
            expires_at: None,
            ..matched
        })
    }

    /// Reject a pending match and return the initiator's slot. Either
    /// participant may reject (the initiator rejecting is a cancel).
    pub async fn reject_match(
        &self,
        match_id: Uuid,
        user_id: &str,
    ) -> Result<Match, MatchingError> {
        let mut tx = self.pool.begin().await?;
        let matched = lock_match(&mut tx, match_id).await?;

        if !matched.involves(user_id) {
            return Err(MatchingError::NotParticipant {
                user_id: user_id.to_string(),
                match_id,
            });
        }
        if matched.status != MatchStatus::Pending {
            return Err(MatchingError::MatchNotPending(match_id));
        }

        let now = Utc::now();
        if matched.expires_at.is_some_and(|at| at <= now) {
            self.expire_pending_match(&mut tx, &matched).await?;
            tx.commit().await?;
            return Err(MatchingError::MatchNotPending(match_id));
        }

        sqlx::query("UPDATE matches SET status = 'rejected' WHERE id = $1")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;
        SlotLedger::release_on(&mut *tx, &matched.user1_id, self.max_slots).await?;
        tx.commit().await?;

        tracing::info!("Match {} rejected by {}", match_id, user_id);

        Ok(Match {
            status: MatchStatus::Rejected,
            ..matched
        })
    }

    /// Lazily expire an overdue pending match, returning the initiator's
    /// slot. The status guard keeps a concurrent sweep from releasing twice.
    async fn expire_pending_match(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        matched: &Match,
    ) -> Result<(), MatchingError> {
        let result =
            sqlx::query("UPDATE matches SET status = 'expired' WHERE id = $1 AND status = 'pending'")
                .bind(matched.id)
                .execute(&mut **tx)
                .await?;
        if result.rows_affected() == 1 {
            SlotLedger::release_on(&mut **tx, &matched.user1_id, self.max_slots).await?;
        }
        Ok(())
    }

    /// Guard against duplicate pairing paths between two users
    async fn ensure_no_open_link(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(), MatchingError> {
        let open_match: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM matches
                WHERE status IN ('pending', 'active')
                  AND ((user1_id = $1 AND user2_id = $2)
                    OR (user1_id = $2 AND user2_id = $1))
            )
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;

        if open_match {
            return Err(MatchingError::DuplicateMatch(
                user_a.to_string(),
                user_b.to_string(),
            ));
        }

        let open_request: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM match_requests
                WHERE status = 'pending'
                  AND ((sender_id = $1 AND receiver_id = $2)
                    OR (sender_id = $2 AND receiver_id = $1))
            )
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;

        if open_request {
            return Err(MatchingError::DuplicateRequest(
                user_a.to_string(),
                user_b.to_string(),
            ));
        }

        Ok(())
    }

    fn publish_created(&self, matched: &Match) {
        self.events.publish(DomainEvent::MatchCreated {
            match_id: matched.id,
            user1_id: matched.user1_id.clone(),
            user2_id: matched.user2_id.clone(),
        });
    }
}

/// Compatibility score with pair-keyed caching. Cache failures degrade to
/// a recompute, never to a matching failure.
pub(crate) async fn compatibility_between(
    cache: &CacheManager,
    a: &User,
    b: &User,
    max_score: i32,
) -> i32 {
    let key = CacheKey::score(&a.id, &b.id);

    match cache.get::<i32>(&key).await {
        Ok(Some(score)) => return score,
        Ok(None) => {}
        Err(e) => tracing::warn!("Score cache read failed for {}: {}", key, e),
    }

    let (score, _) = score_compatibility(a, b, max_score);

    if let Err(e) = cache.set(&key, &score).await {
        tracing::warn!("Score cache write failed for {}: {}", key, e);
    }

    score
}

/// Map a `matches` row to the domain struct
pub(crate) fn match_from_row(row: &PgRow) -> Result<Match, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = MatchStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown match status: {}", status).into()))?;

    Ok(Match {
        id: row.try_get("id")?,
        user1_id: row.try_get("user1_id")?,
        user2_id: row.try_get("user2_id")?,
        status,
        compatibility_score: row.try_get("compatibility_score")?,
        conversation_starter: row.try_get("conversation_starter")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        expires_at: row.try_get::<Option<DateTime<Utc>>, _>("expires_at")?,
    })
}

/// Insert a match row
pub(crate) async fn insert_match<'e>(
    executor: impl PgExecutor<'e>,
    matched: &Match,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO matches (id, user1_id, user2_id, status, compatibility_score,
                             conversation_starter, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(matched.id)
    .bind(&matched.user1_id)
    .bind(&matched.user2_id)
    .bind(matched.status.as_str())
    .bind(matched.compatibility_score)
    .bind(&matched.conversation_starter)
    .bind(matched.created_at)
    .bind(matched.expires_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Fetch a match row under a row lock inside the caller's transaction
async fn lock_match(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    match_id: Uuid,
) -> Result<Match, MatchingError> {
    let row = sqlx::query(
        r#"
        SELECT id, user1_id, user2_id, status, compatibility_score,
               conversation_starter, created_at, expires_at
        FROM matches
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(match_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(match_from_row(&row)?),
        None => Err(MatchingError::MatchNotFound(match_id)),
    }
}
