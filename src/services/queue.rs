use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::QueueSettings;
use crate::core::priority::priority_score;
use crate::core::starters::StarterDeck;
use crate::core::{queue_compatible, score_compatibility};
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    Match, MatchStatus, PriorityWeights, QueueEntry, QueueEntryStatus, QueuePreferences, User,
};
use crate::services::error::MatchingError;
use crate::services::matching::{insert_match, match_from_row};
use crate::services::postgres::PostgresClient;
use crate::services::slots::SlotLedger;

/// Queue entry plus the caller-facing position data
#[derive(Debug)]
pub struct QueueStatus {
    pub entry: QueueEntry,
    pub position: Option<i64>,
    pub estimated_wait_secs: Option<i64>,
}

/// Result of leaving the queue
#[derive(Debug)]
pub enum DequeueOutcome {
    Removed,
    NotQueued,
    /// The entry already reached `matched`; the formed pair is surfaced
    /// instead of being erased.
    AlreadyMatched(Option<Match>),
}

/// Counters from one pairing cycle
#[derive(Debug, Default)]
pub struct BatchReport {
    pub recovered: u64,
    pub examined: usize,
    pub pairs_created: usize,
    pub reverted: usize,
}

/// Background pairing queue.
///
/// Users land here when direct matching finds nothing; a periodic cycle
/// pairs waiting entries in priority order. Joining the queue validates
/// slot availability but reserves nothing; slots are consumed only when a
/// pair actually forms.
pub struct QueueManager {
    pool: PgPool,
    users: Arc<PostgresClient>,
    events: EventBus,
    starters: Arc<StarterDeck>,
    weights: PriorityWeights,
    batch_size: usize,
    max_wait_secs: i64,
    process_interval_secs: u64,
    max_score: i32,
    pending_match_ttl_hours: i64,
}

impl QueueManager {
    pub fn new(
        users: Arc<PostgresClient>,
        events: EventBus,
        starters: Arc<StarterDeck>,
        settings: &QueueSettings,
        max_score: i32,
        pending_match_ttl_hours: i64,
    ) -> Self {
        Self {
            pool: users.pool().clone(),
            users,
            events,
            starters,
            weights: PriorityWeights {
                wait_time: settings.priority_weights.wait_time,
                activity: settings.priority_weights.activity,
                compatibility: settings.priority_weights.compatibility,
            },
            batch_size: settings.batch_size.max(1),
            max_wait_secs: settings.max_wait_secs,
            process_interval_secs: settings.process_interval_secs,
            max_score,
            pending_match_ttl_hours,
        }
    }

    /// Join the queue, or refresh an existing entry in place.
    ///
    /// Idempotent per user: a second call overwrites the preferences and
    /// recomputes the priority instead of duplicating the entry. A live
    /// entry keeps its wait clock; re-joining after a terminal state
    /// restarts it.
    pub async fn enqueue(
        &self,
        user_id: &str,
        preferences: Option<QueuePreferences>,
    ) -> Result<QueueStatus, MatchingError> {
        let user = self.users.get_user(user_id).await?;
        if !user.has_available_slot() {
            return Err(MatchingError::NoAvailableSlots(user_id.to_string()));
        }

        let now = Utc::now();
        let existing = sqlx::query("SELECT status, created_at FROM queue_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let created_at = match existing {
            Some(row) => {
                let status: String = row.try_get("status")?;
                let live = matches!(status.as_str(), "waiting" | "processing");
                if live {
                    row.try_get::<DateTime<Utc>, _>("created_at")?
                } else {
                    now
                }
            }
            None => now,
        };
        let expires_at = created_at + Duration::seconds(self.max_wait_secs);

        let waited_secs = (now - created_at).num_seconds();
        let idle_secs = (now - user.last_active_at).num_seconds();
        let priority = priority_score(
            &user,
            preferences.as_ref(),
            waited_secs,
            idle_secs,
            self.max_wait_secs,
            &self.weights,
        );

        let prefs_json = preferences
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| sqlx::Error::Encode(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO queue_entries
                (user_id, status, priority_score, preferences, created_at,
                 processed_at, matched_with_user_id, match_id, expires_at)
            VALUES ($1, 'waiting', $2, $3, $4, NULL, NULL, NULL, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                status = 'waiting',
                priority_score = EXCLUDED.priority_score,
                preferences = EXCLUDED.preferences,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at,
                processed_at = NULL,
                matched_with_user_id = NULL,
                match_id = NULL
            "#,
        )
        .bind(user_id)
        .bind(priority)
        .bind(prefs_json)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if let Err(e) = self.users.touch_last_active(user_id).await {
            tracing::warn!("Failed to touch last_active for {}: {}", user_id, e);
        }

        tracing::info!("User {} queued (priority {:.3})", user_id, priority);

        self.status(user_id).await
    }

    /// Leave the queue. Losing the race against a pairing cycle is not an
    /// error: the already-formed match is returned instead.
    pub async fn dequeue(&self, user_id: &str) -> Result<DequeueOutcome, MatchingError> {
        let row = sqlx::query("SELECT status, match_id FROM queue_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(DequeueOutcome::NotQueued);
        };

        let status: String = row.try_get("status")?;
        if status == "matched" {
            let match_id: Option<Uuid> = row.try_get("match_id")?;
            return Ok(DequeueOutcome::AlreadyMatched(
                self.fetch_match(match_id).await?,
            ));
        }

        let result = sqlx::query("DELETE FROM queue_entries WHERE user_id = $1 AND status <> 'matched'")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Either a pairing cycle got there first, or a concurrent
            // dequeue already deleted the entry
            let row = sqlx::query("SELECT match_id FROM queue_entries WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            let Some(row) = row else {
                return Ok(DequeueOutcome::Removed);
            };
            let match_id: Option<Uuid> = row.try_get("match_id")?;
            return Ok(DequeueOutcome::AlreadyMatched(
                self.fetch_match(match_id).await?,
            ));
        }

        tracing::info!("User {} left the queue", user_id);
        Ok(DequeueOutcome::Removed)
    }

    /// Entry metadata plus position and a linear wait estimate
    pub async fn status(&self, user_id: &str) -> Result<QueueStatus, MatchingError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, status, priority_score, preferences, created_at,
                   processed_at, matched_with_user_id, match_id, expires_at
            FROM queue_entries
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(MatchingError::QueueEntryNotFound(user_id.to_string()));
        };
        let mut entry = entry_from_row(&row)?;

        // Lazy expiry at read; the status guard keeps it idempotent
        let now = Utc::now();
        if !entry.status.is_terminal() && entry.expires_at <= now {
            let result = sqlx::query(
                "UPDATE queue_entries SET status = 'expired'
                 WHERE user_id = $1 AND status IN ('waiting', 'processing')",
            )
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 1 {
                entry.status = QueueEntryStatus::Expired;
            }
        }

        let (position, estimated) = if entry.status == QueueEntryStatus::Waiting {
            let position: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM queue_entries
                WHERE status = 'waiting'
                  AND (priority_score > $1
                    OR (priority_score = $1 AND created_at <= $2))
                "#,
            )
            .bind(entry.priority_score)
            .bind(entry.created_at)
            .fetch_one(&self.pool)
            .await?;

            (
                Some(position),
                Some(estimated_wait_secs(
                    position,
                    self.batch_size,
                    self.process_interval_secs,
                )),
            )
        } else {
            (None, None)
        };

        Ok(QueueStatus {
            entry,
            position,
            estimated_wait_secs: estimated,
        })
    }

    /// One pairing cycle: visit waiting entries in priority order, in
    /// fixed-size batches, pairing each entry with the first compatible
    /// partner behind it (first fit, deliberately not best fit).
    ///
    /// Each pair commits in its own transaction, so a failure affects only
    /// that pair and the cycle as a whole is safe to re-run.
    pub async fn process_batch(&self) -> Result<BatchReport, MatchingError> {
        let mut report = BatchReport::default();
        let now = Utc::now();

        // Watchdog: a crashed cycle must not leave entries stuck in
        // processing; anything older than one cycle folds back to waiting.
        let cutoff = now - Duration::seconds(self.process_interval_secs as i64);
        let recovered = sqlx::query(
            "UPDATE queue_entries SET status = 'waiting', processed_at = NULL
             WHERE status = 'processing' AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if recovered > 0 {
            tracing::warn!("Recovered {} entries stuck in processing", recovered);
        }
        report.recovered = recovered;

        let rows = sqlx::query(
            r#"
            SELECT user_id, status, priority_score, preferences, created_at,
                   processed_at, matched_with_user_id, match_id, expires_at
            FROM queue_entries
            WHERE status = 'waiting'
            ORDER BY priority_score DESC, created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let entries: Vec<QueueEntry> = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<_, _>>()?;

        let user_ids: Vec<String> = entries.iter().map(|e| e.user_id.clone()).collect();
        let users: HashMap<String, User> = self
            .users
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        for chunk in entries.chunks(self.batch_size) {
            let mut claimed: HashSet<&str> = HashSet::new();

            for (i, entry) in chunk.iter().enumerate() {
                if claimed.contains(entry.user_id.as_str()) {
                    continue;
                }
                report.examined += 1;

                // Claim the entry for this cycle; zero rows means a
                // concurrent dequeue got there first.
                let marked = sqlx::query(
                    "UPDATE queue_entries SET status = 'processing', processed_at = $2
                     WHERE user_id = $1 AND status = 'waiting'",
                )
                .bind(&entry.user_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
                if marked.rows_affected() == 0 {
                    continue;
                }

                let paired = match users.get(entry.user_id.as_str()) {
                    Some(user) if user.has_available_slot() => {
                        self.scan_for_partner(entry, user, &chunk[i + 1..], &claimed, &users)
                            .await
                    }
                    _ => None,
                };

                match paired {
                    Some((partner_id, matched)) => {
                        claimed.insert(entry.user_id.as_str());
                        // The partner id borrows from the chunk we scanned
                        claimed.insert(partner_id);
                        report.pairs_created += 1;
                        self.events.publish(DomainEvent::MatchCreated {
                            match_id: matched.id,
                            user1_id: matched.user1_id.clone(),
                            user2_id: matched.user2_id.clone(),
                        });
                    }
                    None => {
                        // No partner this cycle; back to waiting for the next
                        sqlx::query(
                            "UPDATE queue_entries SET status = 'waiting'
                             WHERE user_id = $1 AND status = 'processing'",
                        )
                        .bind(&entry.user_id)
                        .execute(&self.pool)
                        .await?;
                        report.reverted += 1;
                    }
                }
            }
        }

        if report.pairs_created > 0 {
            tracing::info!(
                "Pairing cycle: {} examined, {} pairs, {} reverted",
                report.examined,
                report.pairs_created,
                report.reverted
            );
        } else {
            tracing::debug!(
                "Pairing cycle: {} examined, no pairs formed",
                report.examined
            );
        }

        Ok(report)
    }

    /// First-fit scan over the rest of the batch. Returns the partner's id
    /// (borrowed from the scanned slice) and the formed match.
    async fn scan_for_partner<'c>(
        &self,
        entry: &QueueEntry,
        user: &User,
        rest: &'c [QueueEntry],
        claimed: &HashSet<&str>,
        users: &HashMap<String, User>,
    ) -> Option<(&'c str, Match)> {
        for other in rest {
            if claimed.contains(other.user_id.as_str()) {
                continue;
            }
            let Some(other_user) = users.get(other.user_id.as_str()) else {
                continue;
            };
            if !other_user.has_available_slot() {
                continue;
            }
            if !queue_compatible(
                user,
                entry.preferences.as_ref(),
                other_user,
                other.preferences.as_ref(),
            ) {
                continue;
            }

            match self.pair_entries(entry, other, user, other_user).await {
                Ok(Some(matched)) => return Some((other.user_id.as_str(), matched)),
                // Slot race or concurrent dequeue; keep scanning
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        "Pairing {} with {} failed, continuing cycle: {}",
                        entry.user_id,
                        other.user_id,
                        e
                    );
                    continue;
                }
            }
        }
        None
    }

    /// Commit one pair: both slots reserved, the match inserted and both
    /// entries flipped to matched, atomically. Any conflict rolls the pair
    /// back without touching the rest of the batch.
    async fn pair_entries(
        &self,
        entry: &QueueEntry,
        other: &QueueEntry,
        user: &User,
        other_user: &User,
    ) -> Result<Option<Match>, MatchingError> {
        let (score, _) = score_compatibility(user, other_user, self.max_score);
        let now = Utc::now();
        let matched = Match {
            id: Uuid::new_v4(),
            user1_id: entry.user_id.clone(),
            user2_id: other.user_id.clone(),
            status: MatchStatus::Pending,
            compatibility_score: score,
            conversation_starter: Some(self.starters.draw().to_string()),
            created_at: now,
            expires_at: Some(now + Duration::hours(self.pending_match_ttl_hours)),
        };

        let mut tx = self.pool.begin().await?;
        if !SlotLedger::reserve_on(&mut *tx, &entry.user_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        if !SlotLedger::reserve_on(&mut *tx, &other.user_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        insert_match(&mut *tx, &matched).await?;

        for (user_id, partner_id) in [
            (&entry.user_id, &other.user_id),
            (&other.user_id, &entry.user_id),
        ] {
            let updated = sqlx::query(
                r#"
                UPDATE queue_entries
                SET status = 'matched', matched_with_user_id = $2, match_id = $3,
                    processed_at = $4
                WHERE user_id = $1 AND status IN ('waiting', 'processing')
                "#,
            )
            .bind(user_id)
            .bind(partner_id)
            .bind(matched.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                // Entry vanished mid-scan (concurrent dequeue)
                tx.rollback().await?;
                return Ok(None);
            }
        }

        tx.commit().await?;
        tracing::info!(
            "Queue paired {} with {} (score {})",
            entry.user_id,
            other.user_id,
            score
        );
        Ok(Some(matched))
    }

    /// Expire entries that outlived the maximum wait. No slot release:
    /// joining the queue never reserved one.
    pub async fn expire_stale(&self) -> Result<u64, MatchingError> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'expired'
             WHERE status IN ('waiting', 'processing') AND expires_at <= NOW()",
        )
        .execute(&self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            tracing::info!("Expired {} stale queue entries", expired);
        }
        Ok(expired)
    }

    async fn fetch_match(&self, match_id: Option<Uuid>) -> Result<Option<Match>, MatchingError> {
        let Some(match_id) = match_id else {
            return Ok(None);
        };

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

        Ok(row.as_ref().map(match_from_row).transpose()?)
    }
}

/// Linear wait estimate: full cycles needed to reach this position
fn estimated_wait_secs(position: i64, batch_size: usize, interval_secs: u64) -> i64 {
    let batch = batch_size.max(1) as i64;
    let cycles = (position.max(1) + batch - 1) / batch;
    cycles * interval_secs as i64
}

/// Map a `queue_entries` row to the domain struct
fn entry_from_row(row: &PgRow) -> Result<QueueEntry, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = QueueEntryStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown queue status: {}", status).into()))?;

    let preferences: Option<QueuePreferences> = row
        .try_get::<Option<serde_json::Value>, _>("preferences")?
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(QueueEntry {
        user_id: row.try_get("user_id")?,
        status,
        priority_score: row.try_get("priority_score")?,
        preferences,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        processed_at: row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
        matched_with_user_id: row.try_get("matched_with_user_id")?,
        match_id: row.try_get("match_id")?,
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_wait_is_linear_in_cycles() {
        // One batch per cycle, 30s cadence
        assert_eq!(estimated_wait_secs(1, 10, 30), 30);
        assert_eq!(estimated_wait_secs(10, 10, 30), 30);
        assert_eq!(estimated_wait_secs(11, 10, 30), 60);
        assert_eq!(estimated_wait_secs(25, 10, 30), 90);
    }

    #[test]
    fn test_estimated_wait_handles_degenerate_inputs() {
        assert_eq!(estimated_wait_secs(0, 10, 30), 30);
        assert_eq!(estimated_wait_secs(5, 0, 30), 150);
    }
}
