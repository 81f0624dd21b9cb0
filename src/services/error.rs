use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy shared by the three pairing paths.
///
/// Business-rule violations are surfaced to the caller as typed variants;
/// storage failures pass through as `Database`.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("no available slots for user {0}")]
    NoAvailableSlots(String),

    #[error("an open match already exists between {0} and {1}")]
    DuplicateMatch(String, String),

    #[error("a pending request already exists between {0} and {1}")]
    DuplicateRequest(String, String),

    #[error("match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("match {0} is not pending")]
    MatchNotPending(Uuid),

    #[error("user {user_id} is not part of match {match_id}")]
    NotParticipant { user_id: String, match_id: Uuid },

    #[error("only the invited user may accept match {0}")]
    NotMatchRecipient(Uuid),

    #[error("no queue entry for user {0}")]
    QueueEntryNotFound(String),

    #[error("match request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("match request {0} is not pending")]
    RequestNotPending(Uuid),

    #[error("match request {0} has expired")]
    RequestExpired(Uuid),

    #[error("only the receiver may respond to request {0}")]
    NotRequestReceiver(Uuid),

    #[error("cannot pair a user with themselves")]
    SelfPairing,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MatchingError {
    /// Stable machine-readable tag used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchingError::UserNotFound(_) => "user_not_found",
            MatchingError::NoAvailableSlots(_) => "no_available_slots",
            MatchingError::DuplicateMatch(_, _) => "duplicate_match",
            MatchingError::DuplicateRequest(_, _) => "duplicate_request",
            MatchingError::MatchNotFound(_) => "match_not_found",
            MatchingError::MatchNotPending(_) => "match_not_pending",
            MatchingError::NotParticipant { .. } => "not_participant",
            MatchingError::NotMatchRecipient(_) => "not_match_recipient",
            MatchingError::QueueEntryNotFound(_) => "queue_entry_not_found",
            MatchingError::RequestNotFound(_) => "request_not_found",
            MatchingError::RequestNotPending(_) => "request_not_pending",
            MatchingError::RequestExpired(_) => "request_expired",
            MatchingError::NotRequestReceiver(_) => "not_request_receiver",
            MatchingError::SelfPairing => "self_pairing",
            MatchingError::Database(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            MatchingError::UserNotFound(_)
            | MatchingError::MatchNotFound(_)
            | MatchingError::QueueEntryNotFound(_)
            | MatchingError::RequestNotFound(_) => 404,
            MatchingError::NoAvailableSlots(_)
            | MatchingError::DuplicateMatch(_, _)
            | MatchingError::DuplicateRequest(_, _)
            | MatchingError::MatchNotPending(_)
            | MatchingError::RequestNotPending(_)
            | MatchingError::RequestExpired(_) => 409,
            MatchingError::NotParticipant { .. }
            | MatchingError::NotMatchRecipient(_)
            | MatchingError::NotRequestReceiver(_) => 403,
            MatchingError::SelfPairing => 400,
            MatchingError::Database(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MatchingError::UserNotFound("u".into()).status_code(), 404);
        assert_eq!(MatchingError::NoAvailableSlots("u".into()).status_code(), 409);
        assert_eq!(MatchingError::SelfPairing.status_code(), 400);
        assert_eq!(
            MatchingError::NotParticipant {
                user_id: "u".into(),
                match_id: Uuid::new_v4()
            }
            .status_code(),
            403
        );
    }

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(MatchingError::SelfPairing.kind(), "self_pairing");
        assert_eq!(
            MatchingError::DuplicateRequest("a".into(), "b".into()).kind(),
            "duplicate_request"
        );
    }
}
