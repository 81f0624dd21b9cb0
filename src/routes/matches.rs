use actix_web::{web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ErrorResponse, MatchDecisionRequest, MatchListResponse, RequestMatchRequest,
    RequestMatchResponse,
};
use crate::routes::{error_response, validation_failed, AppState};
use crate::services::MatchOutcome;

/// Configure match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches/request", web::post().to(request_match))
        .route("/matches", web::get().to(get_user_matches))
        .route("/matches/{match_id}", web::get().to(get_match_details))
        .route("/matches/{match_id}/accept", web::post().to(accept_match))
        .route("/matches/{match_id}/reject", web::post().to(reject_match));
}

/// Request a match
///
/// POST /api/v1/matches/request
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "targetUserId": "string (optional)"
/// }
/// ```
///
/// With a target, proposes a pending match to that user. Without one,
/// searches the pool and falls over to the queue.
async fn request_match(
    state: web::Data<AppState>,
    req: web::Json<RequestMatchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    tracing::info!(
        "Match requested by {} (target: {:?})",
        req.user_id,
        req.target_user_id
    );

    match state
        .matching
        .request_match(&req.user_id, req.target_user_id.as_deref())
        .await
    {
        Ok(MatchOutcome::Matched(matched)) => {
            HttpResponse::Ok().json(RequestMatchResponse::Matched { matched })
        }
        Ok(MatchOutcome::Queued {
            position,
            estimated_wait_secs,
        }) => HttpResponse::Accepted().json(RequestMatchResponse::Queued {
            queued: true,
            position,
            estimated_wait_secs,
        }),
        Err(e) => error_response(&e),
    }
}

/// List the caller's matches
///
/// GET /api/v1/matches?userId={userId}
async fn get_user_matches(
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

    match state.matching.get_user_matches(user_id).await {
        Ok(matches) => {
            let count = matches.len();
            HttpResponse::Ok().json(MatchListResponse { matches, count })
        }
        Err(e) => error_response(&e),
    }
}

/// Fetch one match; participants only
///
/// GET /api/v1/matches/{matchId}?userId={userId}
async fn get_match_details(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> impl Responder {
    let match_id = path.into_inner();
    let Some(user_id) = query.get("userId") else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "missing_parameter".to_string(),
            message: "userId query parameter is required".to_string(),
            status_code: 400,
        });
    };

    match state.matching.get_match_details(match_id, user_id).await {
        Ok(matched) => HttpResponse::Ok().json(matched),
        Err(e) => error_response(&e),
    }
}

/// Accept a pending match
///
/// POST /api/v1/matches/{matchId}/accept
async fn accept_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<MatchDecisionRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .matching
        .accept_match(path.into_inner(), &req.user_id)
        .await
    {
        Ok(matched) => HttpResponse::Ok().json(matched),
        Err(e) => error_response(&e),
    }
}

/// Reject a pending match
///
/// POST /api/v1/matches/{matchId}/reject
async fn reject_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<MatchDecisionRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .matching
        .reject_match(path.into_inner(), &req.user_id)
        .await
    {
        Ok(matched) => HttpResponse::Ok().json(matched),
        Err(e) => error_response(&e),
    }
}
