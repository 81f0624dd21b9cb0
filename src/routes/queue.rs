use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::models::{DequeueResponse, EnqueueRequest, QueueStatusResponse};
use crate::routes::{error_response, validation_failed, AppState};
use crate::services::DequeueOutcome;

/// Configure queue routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/queue", web::post().to(enqueue))
        .route("/queue/{user_id}", web::delete().to(dequeue))
        .route("/queue/{user_id}", web::get().to(queue_status));
}

/// Join the pairing queue (idempotent per user)
///
/// POST /api/v1/queue
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "preferences": { "ageMin": 21, "ageMax": 35, "location": "NYC" }
/// }
/// ```
async fn enqueue(state: web::Data<AppState>, req: web::Json<EnqueueRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .queue
        .enqueue(&req.user_id, req.preferences.clone())
        .await
    {
        Ok(status) => HttpResponse::Ok().json(QueueStatusResponse {
            entry: status.entry,
            position: status.position,
            estimated_wait_secs: status.estimated_wait_secs,
        }),
        Err(e) => error_response(&e),
    }
}

/// Leave the queue
///
/// DELETE /api/v1/queue/{userId}
///
/// Removing an entry that was already paired returns the formed match
/// instead of erasing it.
async fn dequeue(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let user_id = path.into_inner();

    match state.queue.dequeue(&user_id).await {
        Ok(DequeueOutcome::Removed) => HttpResponse::Ok().json(DequeueResponse {
            removed: true,
            matched: None,
        }),
        Ok(DequeueOutcome::NotQueued) => HttpResponse::Ok().json(DequeueResponse {
            removed: false,
            matched: None,
        }),
        Ok(DequeueOutcome::AlreadyMatched(matched)) => HttpResponse::Conflict().json(DequeueResponse {
            removed: false,
            matched,
        }),
        Err(e) => error_response(&e),
    }
}

/// Queue position and entry metadata
///
/// GET /api/v1/queue/{userId}
async fn queue_status(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let user_id = path.into_inner();

    match state.queue.status(&user_id).await {
        Ok(status) => HttpResponse::Ok().json(QueueStatusResponse {
            entry: status.entry,
            position: status.position,
            estimated_wait_secs: status.estimated_wait_secs,
        }),
        Err(e) => error_response(&e),
    }
}
