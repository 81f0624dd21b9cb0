// Route exports
pub mod matches;
pub mod queue;
pub mod requests;

use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::sync::Arc;

use crate::models::{ErrorResponse, HealthResponse, SlotResetResponse};
use crate::services::{
    MatchRequestService, MatchingError, MatchingService, PostgresClient, QueueManager, SlotLedger,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub matching: Arc<MatchingService>,
    pub queue: Arc<QueueManager>,
    pub requests: Arc<MatchRequestService>,
    pub slots: Arc<SlotLedger>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .route("/users/{user_id}/slots/reset", web::post().to(reset_slots))
            .configure(matches::configure)
            .configure(queue::configure)
            .configure(requests::configure),
    );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.postgres.health_check().await.unwrap_or(false);

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Restore a user's full slot allotment
///
/// POST /api/v1/users/{userId}/slots/reset
///
/// Invoked by top-up / renewal collaborators when their policy says the
/// allotment rolls over.
async fn reset_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();

    match state.slots.reset(&user_id).await {
        Ok((available, used)) => HttpResponse::Ok().json(SlotResetResponse {
            user_id,
            available_slots: available,
            total_slots_used: used,
        }),
        Err(e) => error_response(&e),
    }
}

/// Map a service error to the JSON error shape
pub(crate) fn error_response(err: &MatchingError) -> HttpResponse {
    let code = err.status_code();
    if code >= 500 {
        tracing::error!("Internal error: {}", err);
    }

    HttpResponse::build(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .json(ErrorResponse {
            error: err.kind().to_string(),
            message: err.to_string(),
            status_code: code,
        })
}

/// Reject a request that failed DTO validation
pub(crate) fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "validation_failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let err = MatchingError::UserNotFound("ghost".to_string());
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
