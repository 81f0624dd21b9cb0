//! Kindred Algo - slot-based pairing service for the Kindred companion app
//!
//! This library implements the pairing engine: compatibility scoring, the
//! per-user slot ledger, on-demand matching with queue fail-over, the
//! background priority queue, and the explicit match-request workflow.

pub mod config;
pub mod core;
pub mod events;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{mutual_age_compatible, priority_score, score_compatibility, StarterDeck};
pub use models::{
    Match, MatchRequest, MatchRequestStatus, MatchStatus, PriorityWeights, QueueEntry,
    QueueEntryStatus, QueuePreferences, User,
};
pub use services::{MatchOutcome, MatchingError};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let user = User {
            id: "u1".to_string(),
            display_name: "U1".to_string(),
            age: Some(25),
            age_preference_min: None,
            age_preference_max: None,
            community: None,
            location: None,
            interests: Some("music".to_string()),
            available_slots: 3,
            total_slots_used: 0,
            is_active: true,
            last_active_at: Utc::now(),
        };

        let (score, _) = score_compatibility(&user, &user, 100);
        assert!(score <= 100);
    }
}
