use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile with demographic data and the slot counters.
///
/// Slots are only ever mutated through the slot ledger so that
/// `available_slots + total_slots_used` stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(rename = "agePreferenceMin", default)]
    pub age_preference_min: Option<i32>,
    #[serde(rename = "agePreferenceMax", default)]
    pub age_preference_max: Option<i32>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(rename = "availableSlots")]
    pub available_slots: i32,
    #[serde(rename = "totalSlotsUsed")]
    pub total_slots_used: i32,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "lastActiveAt")]
    pub last_active_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

impl User {
    pub fn has_available_slot(&self) -> bool {
        self.available_slots > 0
    }
}

/// Match lifecycle states. Completed, expired and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
    Expired,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Active => "active",
            MatchStatus::Completed => "completed",
            MatchStatus::Expired => "expired",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MatchStatus::Pending),
            "active" => Some(MatchStatus::Active),
            "completed" => Some(MatchStatus::Completed),
            "expired" => Some(MatchStatus::Expired),
            "rejected" => Some(MatchStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Completed | MatchStatus::Expired | MatchStatus::Rejected
        )
    }
}

/// A formed pair. The (user1, user2) pair is unordered; user1 is the
/// initiator where one exists (direct targeting, match requests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    #[serde(rename = "user1Id")]
    pub user1_id: String,
    #[serde(rename = "user2Id")]
    pub user2_id: String,
    pub status: MatchStatus,
    #[serde(rename = "compatibilityScore")]
    pub compatibility_score: i32,
    #[serde(rename = "conversationStarter")]
    pub conversation_starter: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }
}

/// Queue entry lifecycle states. Matched and expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEntryStatus {
    Waiting,
    Processing,
    Matched,
    Expired,
}

impl QueueEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Waiting => "waiting",
            QueueEntryStatus::Processing => "processing",
            QueueEntryStatus::Matched => "matched",
            QueueEntryStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(QueueEntryStatus::Waiting),
            "processing" => Some(QueueEntryStatus::Processing),
            "matched" => Some(QueueEntryStatus::Matched),
            "expired" => Some(QueueEntryStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueEntryStatus::Matched | QueueEntryStatus::Expired)
    }
}

/// Optional filter a user attaches when joining the queue. Fields left
/// unset fall back to the profile preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePreferences {
    #[serde(rename = "ageMin", default)]
    pub age_min: Option<i32>,
    #[serde(rename = "ageMax", default)]
    pub age_max: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A waiting-to-be-matched user. At most one non-terminal entry per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub status: QueueEntryStatus,
    #[serde(rename = "priorityScore")]
    pub priority_score: f64,
    pub preferences: Option<QueuePreferences>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "processedAt")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(rename = "matchedWithUserId")]
    pub matched_with_user_id: Option<String>,
    #[serde(rename = "matchId")]
    pub match_id: Option<Uuid>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

/// Match request lifecycle states. Accepted, declined and expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRequestStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl MatchRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRequestStatus::Pending => "pending",
            MatchRequestStatus::Accepted => "accepted",
            MatchRequestStatus::Declined => "declined",
            MatchRequestStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MatchRequestStatus::Pending),
            "accepted" => Some(MatchRequestStatus::Accepted),
            "declined" => Some(MatchRequestStatus::Declined),
            "expired" => Some(MatchRequestStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchRequestStatus::Pending)
    }
}

/// An explicit, consent-based pairing proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: Uuid,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    pub message: Option<String>,
    #[serde(rename = "compatibilityScore")]
    pub compatibility_score: i32,
    pub status: MatchRequestStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "respondedAt")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl MatchRequest {
    /// Expiration is evaluated lazily against the clock; an overdue pending
    /// request reads as expired even before a sweep persists the transition.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MatchRequestStatus {
        if self.status == MatchRequestStatus::Pending && self.expires_at <= now {
            MatchRequestStatus::Expired
        } else {
            self.status
        }
    }
}

/// Weights for the queue priority formula.
#[derive(Debug, Clone, Copy)]
pub struct PriorityWeights {
    pub wait_time: f64,
    pub activity: f64,
    pub compatibility: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            wait_time: 0.4,
            activity: 0.3,
            compatibility: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_status_round_trip() {
        for status in [
            MatchStatus::Pending,
            MatchStatus::Active,
            MatchStatus::Completed,
            MatchStatus::Expired,
            MatchStatus::Rejected,
        ] {
            assert_eq!(MatchStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MatchStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!MatchStatus::Pending.is_terminal());
        assert!(!MatchStatus::Active.is_terminal());
        assert!(MatchStatus::Rejected.is_terminal());
        assert!(QueueEntryStatus::Matched.is_terminal());
        assert!(!QueueEntryStatus::Processing.is_terminal());
        assert!(MatchRequestStatus::Declined.is_terminal());
        assert!(!MatchRequestStatus::Pending.is_terminal());
    }

    #[test]
    fn test_match_partner_lookup() {
        let m = Match {
            id: Uuid::new_v4(),
            user1_id: "alice".to_string(),
            user2_id: "bob".to_string(),
            status: MatchStatus::Active,
            compatibility_score: 85,
            conversation_starter: None,
            created_at: Utc::now(),
            expires_at: None,
        };

        assert!(m.involves("alice"));
        assert!(!m.involves("carol"));
        assert_eq!(m.partner_of("alice"), Some("bob"));
        assert_eq!(m.partner_of("carol"), None);
    }

    #[test]
    fn test_lazy_request_expiry() {
        let now = Utc::now();
        let request = MatchRequest {
            id: Uuid::new_v4(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            message: None,
            compatibility_score: 60,
            status: MatchRequestStatus::Pending,
            created_at: now - chrono::Duration::hours(25),
            expires_at: now - chrono::Duration::hours(1),
            responded_at: None,
        };

        assert_eq!(request.effective_status(now), MatchRequestStatus::Expired);

        // A responded request keeps its stored status
        let declined = MatchRequest {
            status: MatchRequestStatus::Declined,
            ..request
        };
        assert_eq!(declined.effective_status(now), MatchRequestStatus::Declined);
    }
}
