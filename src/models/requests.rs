use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::QueuePreferences;

/// Request a match, either against a specific target or from the pool
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestMatchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(alias = "target_user_id", rename = "targetUserId", default)]
    pub target_user_id: Option<String>,
}

/// Accept or reject a pending match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchDecisionRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}

/// Join the pairing queue
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub preferences: Option<QueuePreferences>,
}

/// Send an explicit match request to another user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchRequestCreateRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "sender_id", rename = "senderId")]
    pub sender_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "receiver_id", rename = "receiverId")]
    pub receiver_id: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub message: Option<String>,
}

/// Accept or decline a received match request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchRequestDecisionRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}
