use serde::{Deserialize, Serialize};

use crate::models::domain::{Match, MatchRequest, QueueEntry};

/// Response for the request-match endpoint: either a formed match or a
/// confirmation that the caller was handed to the queue.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestMatchResponse {
    Matched {
        #[serde(rename = "match")]
        matched: Match,
    },
    Queued {
        queued: bool,
        position: i64,
        #[serde(rename = "estimatedWaitSecs")]
        estimated_wait_secs: i64,
    },
}

/// Response listing a user's matches
#[derive(Debug, Clone, Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<Match>,
    pub count: usize,
}

/// Queue position and entry metadata
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusResponse {
    pub entry: QueueEntry,
    pub position: Option<i64>,
    #[serde(rename = "estimatedWaitSecs")]
    pub estimated_wait_secs: Option<i64>,
}

/// Response for leaving the queue
#[derive(Debug, Clone, Serialize)]
pub struct DequeueResponse {
    pub removed: bool,
    /// Set when the user was already paired before the dequeue landed.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<Match>,
}

/// Sent and received match requests for one user
#[derive(Debug, Clone, Serialize)]
pub struct MatchRequestListResponse {
    pub sent: Vec<MatchRequest>,
    pub received: Vec<MatchRequest>,
}

/// Response after accepting a match request
#[derive(Debug, Clone, Serialize)]
pub struct AcceptRequestResponse {
    pub request: MatchRequest,
    #[serde(rename = "match")]
    pub matched: Match,
}

/// Slot counters after an explicit reset
#[derive(Debug, Clone, Serialize)]
pub struct SlotResetResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "availableSlots")]
    pub available_slots: i32,
    #[serde(rename = "totalSlotsUsed")]
    pub total_slots_used: i32,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
