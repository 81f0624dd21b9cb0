// Service exports
pub mod cache;
pub mod error;
pub mod matching;
pub mod postgres;
pub mod queue;
pub mod requests;
pub mod scheduler;
pub mod slots;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use error::MatchingError;
pub use matching::{MatchOutcome, MatchingService};
pub use postgres::PostgresClient;
pub use queue::{BatchReport, DequeueOutcome, QueueManager, QueueStatus};
pub use requests::MatchRequestService;
pub use scheduler::Scheduler;
pub use slots::SlotLedger;
