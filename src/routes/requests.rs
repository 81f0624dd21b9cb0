use actix_web::{web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    AcceptRequestResponse, ErrorResponse, MatchRequestCreateRequest, MatchRequestDecisionRequest,
    MatchRequestListResponse,
};
use crate::routes::{error_response, validation_failed, AppState};

/// Configure match-request routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/requests", web::post().to(create_request))
        .route("/requests", web::get().to(list_requests))
        .route("/requests/{request_id}/accept", web::post().to(accept_request))
        .route("/requests/{request_id}/decline", web::post().to(decline_request));
}

/// Send a match request
///
/// POST /api/v1/requests
///
/// Request body:
/// ```json
/// {
///   "senderId": "string",
///   "receiverId": "string",
///   "message": "string (optional)"
/// }
/// ```
async fn create_request(
    state: web::Data<AppState>,
    req: web::Json<MatchRequestCreateRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    tracing::info!("Match request from {} to {}", req.sender_id, req.receiver_id);

    match state
        .requests
        .create(&req.sender_id, &req.receiver_id, req.message.clone())
        .await
    {
        Ok(request) => HttpResponse::Created().json(request),
        Err(e) => error_response(&e),
    }
}

/// Accept a received match request, producing an active match
///
/// POST /api/v1/requests/{requestId}/accept
async fn accept_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<MatchRequestDecisionRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .requests
        .accept(path.into_inner(), &req.user_id)
        .await
    {
        Ok((request, matched)) => {
            HttpResponse::Ok().json(AcceptRequestResponse { request, matched })
        }
        Err(e) => error_response(&e),
    }
}

/// Decline a received match request
///
/// POST /api/v1/requests/{requestId}/decline
async fn decline_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<MatchRequestDecisionRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .requests
        .decline(path.into_inner(), &req.user_id)
        .await
    {
        Ok(request) => HttpResponse::Ok().json(request),
        Err(e) => error_response(&e),
    }
}

/// Sent and received match requests for a user
///
/// GET /api/v1/requests?userId={userId}
async fn list_requests(
    state: web::Data<AppState>,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> impl Responder {
    let Some(user_id) = query.get("userId") else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "missing_parameter".to_string(),
            message: "userId query parameter is required".to_string(),
            status_code: 400,
        });
    };

    match state.requests.list(user_id).await {
        Ok((sent, received)) => {
            HttpResponse::Ok().json(MatchRequestListResponse { sent, received })
        }
        Err(e) => error_response(&e),
    }
}
