use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::starters::StarterDeck;
use crate::events::{DomainEvent, EventBus};
use crate::models::{Match, MatchRequest, MatchRequestStatus, MatchStatus};
use crate::services::cache::CacheManager;
use crate::services::error::MatchingError;
use crate::services::matching::{compatibility_between, insert_match};
use crate::services::postgres::PostgresClient;
use crate::services::slots::SlotLedger;

/// Explicit, consent-based pairing: the sender proposes, the receiver
/// accepts or declines. The sender's slot is held for the lifetime of the
/// request and returned on decline or expiry.
pub struct MatchRequestService {
    pool: PgPool,
    users: Arc<PostgresClient>,
    cache: Arc<CacheManager>,
    events: EventBus,
    starters: Arc<StarterDeck>,
    ttl_hours: i64,
    max_score: i32,
    max_slots: i32,
}

impl MatchRequestService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<PostgresClient>,
        cache: Arc<CacheManager>,
        events: EventBus,
        starters: Arc<StarterDeck>,
        ttl_hours: i64,
        max_score: i32,
        max_slots: i32,
    ) -> Self {
        Self {
            pool: users.pool().clone(),
            users,
            cache,
            events,
            starters,
            ttl_hours,
            max_score,
            max_slots,
        }
    }

    /// Send a match request, reserving one of the sender's slots for its
    /// lifetime.
    pub async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        message: Option<String>,
    ) -> Result<MatchRequest, MatchingError> {
        if sender_id == receiver_id {
            return Err(MatchingError::SelfPairing);
        }

        let sender = self.users.get_user(sender_id).await?;
        let receiver = self.users.get_user(receiver_id).await?;

        let pending_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM match_requests
                WHERE status = 'pending'
                  AND ((sender_id = $1 AND receiver_id = $2)
                    OR (sender_id = $2 AND receiver_id = $1))
            )
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        if pending_exists {
            return Err(MatchingError::DuplicateRequest(
                sender_id.to_string(),
                receiver_id.to_string(),
            ));
        }

        let score =
            compatibility_between(&self.cache, &sender, &receiver, self.max_score).await;

        let now = Utc::now();
        let request = MatchRequest {
            id: Uuid::new_v4(),
            sender_id: sender.id.clone(),
            receiver_id: receiver.id.clone(),
            message,
            compatibility_score: score,
            status: MatchRequestStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(self.ttl_hours),
            responded_at: None,
        };

        let mut tx = self.pool.begin().await?;
        if !SlotLedger::reserve_on(&mut *tx, sender_id).await? {
            return Err(MatchingError::NoAvailableSlots(sender_id.to_string()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO match_requests
                (id, sender_id, receiver_id, message, compatibility_score,
                 status, created_at, expires_at, responded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
            "#,
        )
        .bind(request.id)
        .bind(&request.sender_id)
        .bind(&request.receiver_id)
        .bind(&request.message)
        .bind(request.compatibility_score)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.expires_at)
        .execute(&mut *tx)
        .await;

        // The partial unique index backstops the duplicate check against
        // a concurrent create for the same pair.
        if let Err(e) = inserted {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                return Err(MatchingError::DuplicateRequest(
                    sender_id.to_string(),
                    receiver_id.to_string(),
                ));
            }
            return Err(e.into());
        }

        tx.commit().await?;

        if let Err(e) = self.users.touch_last_active(sender_id).await {
            tracing::warn!("Failed to touch last_active for {}: {}", sender_id, e);
        }

        tracing::info!(
            "Match request {} sent from {} to {} (score {})",
            request.id,
            sender_id,
            receiver_id,
            score
        );

        Ok(request)
    }

    /// Accept a pending request: reserves the receiver's slot and produces
    /// an active match. An overdue request expires as a side effect and
    /// the accept fails.
    pub async fn accept(
        &self,
        request_id: Uuid,
        responder_id: &str,
    ) -> Result<(MatchRequest, Match), MatchingError> {
        let mut tx = self.pool.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;

        if responder_id != request.receiver_id {
            return Err(MatchingError::NotRequestReceiver(request_id));
        }
        match request.status {
            MatchRequestStatus::Pending => {}
            MatchRequestStatus::Expired => return Err(MatchingError::RequestExpired(request_id)),
            _ => return Err(MatchingError::RequestNotPending(request_id)),
        }

        let now = Utc::now();
        if request.expires_at <= now {
            self.expire_pending(&mut tx, &request).await?;
            tx.commit().await?;
            return Err(MatchingError::RequestExpired(request_id));
        }

        if !SlotLedger::reserve_on(&mut *tx, responder_id).await? {
            return Err(MatchingError::NoAvailableSlots(responder_id.to_string()));
        }

        let matched = Match {
            id: Uuid::new_v4(),
            user1_id: request.sender_id.clone(),
            user2_id: request.receiver_id.clone(),
            status: MatchStatus::Active,
            compatibility_score: request.compatibility_score,
            conversation_starter: Some(self.starters.draw().to_string()),
            created_at: now,
            expires_at: None,
        };
        insert_match(&mut *tx, &matched).await?;

        sqlx::query(
            "UPDATE match_requests SET status = 'accepted', responded_at = $2 WHERE id = $1",
        )
        .bind(request_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.events.publish(DomainEvent::MatchCreated {
            match_id: matched.id,
            user1_id: matched.user1_id.clone(),
            user2_id: matched.user2_id.clone(),
        });
        self.events.publish(DomainEvent::MatchRequestAccepted {
            request_id,
            match_id: matched.id,
        });

        tracing::info!("Match request {} accepted, match {} created", request_id, matched.id);

        let request = MatchRequest {
            status: MatchRequestStatus::Accepted,
            responded_at: Some(now),
            ..request
        };
        Ok((request, matched))
    }

    /// Decline a pending request, returning the sender's slot
    pub async fn decline(
        &self,
        request_id: Uuid,
        responder_id: &str,
    ) -> Result<MatchRequest, MatchingError> {
        let mut tx = self.pool.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;

        if responder_id != request.receiver_id {
            return Err(MatchingError::NotRequestReceiver(request_id));
        }
        match request.status {
            MatchRequestStatus::Pending => {}
            MatchRequestStatus::Expired => return Err(MatchingError::RequestExpired(request_id)),
            _ => return Err(MatchingError::RequestNotPending(request_id)),
        }

        let now = Utc::now();
        if request.expires_at <= now {
            self.expire_pending(&mut tx, &request).await?;
            tx.commit().await?;
            return Err(MatchingError::RequestExpired(request_id));
        }

        sqlx::query(
            "UPDATE match_requests SET status = 'declined', responded_at = $2 WHERE id = $1",
        )
        .bind(request_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        SlotLedger::release_on(&mut *tx, &request.sender_id, self.max_slots).await?;

        tx.commit().await?;

        tracing::info!("Match request {} declined by {}", request_id, responder_id);

        Ok(MatchRequest {
            status: MatchRequestStatus::Declined,
            responded_at: Some(now),
            ..request
        })
    }

    /// Sweep overdue pending requests: each transitions to expired and
    /// refunds the sender's slot in its own transaction. The status guard
    /// makes re-runs and concurrent sweeps release-safe.
    pub async fn cleanup_expired(&self) -> Result<u64, MatchingError> {
        let overdue: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM match_requests WHERE status = 'pending' AND expires_at <= NOW()",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut expired = 0u64;
        for request_id in overdue {
            match self.expire_one(request_id).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to expire request {}: {}", request_id, e);
                }
            }
        }

        if expired > 0 {
            tracing::info!("Expired {} overdue match requests", expired);
        }
        Ok(expired)
    }

    async fn expire_one(&self, request_id: Uuid) -> Result<bool, MatchingError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE match_requests SET status = 'expired'
            WHERE id = $1 AND status = 'pending'
            RETURNING sender_id
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // Someone responded (or another sweep ran) in the meantime
            return Ok(false);
        };
        let sender_id: String = row.try_get("sender_id")?;
        SlotLedger::release_on(&mut *tx, &sender_id, self.max_slots).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn expire_pending(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        request: &MatchRequest,
    ) -> Result<(), MatchingError> {
        let result = sqlx::query(
            "UPDATE match_requests SET status = 'expired' WHERE id = $1 AND status = 'pending'",
        )
        .bind(request.id)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 1 {
            SlotLedger::release_on(&mut **tx, &request.sender_id, self.max_slots).await?;
        }
        Ok(())
    }

    /// Requests sent and received by a user, newest first. Overdue pending
    /// requests read as expired even before the sweep persists it.
    pub async fn list(
        &self,
        user_id: &str,
    ) -> Result<(Vec<MatchRequest>, Vec<MatchRequest>), MatchingError> {
        self.users.get_user(user_id).await?;

        let now = Utc::now();
        let sent = self.list_side(user_id, "sender_id", now).await?;
        let received = self.list_side(user_id, "receiver_id", now).await?;
        Ok((sent, received))
    }

    async fn list_side(
        &self,
        user_id: &str,
        side: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchRequest>, MatchingError> {
        let query = format!(
            r#"
            SELECT id, sender_id, receiver_id, message, compatibility_score,
                   status, created_at, expires_at, responded_at
            FROM match_requests
            WHERE {} = $1
            ORDER BY created_at DESC
            "#,
            side
        );

        let rows = sqlx::query(&query).bind(user_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let mut request = request_from_row(row)?;
                request.status = request.effective_status(now);
                Ok(request)
            })
            .collect()
    }
}

/// Map a `match_requests` row to the domain struct
fn request_from_row(row: &PgRow) -> Result<MatchRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = MatchRequestStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown request status: {}", status).into()))?;

    Ok(MatchRequest {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        message: row.try_get("message")?,
        compatibility_score: row.try_get("compatibility_score")?,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
        responded_at: row.try_get::<Option<DateTime<Utc>>, _>("responded_at")?,
    })
}

/// Fetch a request row under a row lock inside the caller's transaction
async fn lock_request(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request_id: Uuid,
) -> Result<MatchRequest, MatchingError> {
    let row = sqlx::query(
        r#"
        SELECT id, sender_id, receiver_id, message, compatibility_score,
               status, created_at, expires_at, responded_at
        FROM match_requests
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(request_from_row(&row)?),
        None => Err(MatchingError::RequestNotFound(request_id)),
    }
}
