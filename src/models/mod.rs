// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Match, MatchRequest, MatchRequestStatus, MatchStatus, PriorityWeights, QueueEntry,
    QueueEntryStatus, QueuePreferences, User,
};
pub use requests::{
    EnqueueRequest, MatchDecisionRequest, MatchRequestCreateRequest, MatchRequestDecisionRequest,
    RequestMatchRequest,
};
pub use responses::{
    AcceptRequestResponse, DequeueResponse, ErrorResponse, HealthResponse, MatchListResponse,
    MatchRequestListResponse, QueueStatusResponse, RequestMatchResponse, SlotResetResponse,
};
