use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::core::{resolve, SnapshotDefaults, SnapshotError};
use crate::models::{ErrorResponse, HealthResponse, SnapshotQuery, SnapshotResponse};
use crate::services::SnapshotStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub defaults: SnapshotDefaults,
}

/// Configure snapshot routes; both slash forms are accepted
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health/", web::get().to(health_check))
        .route("/health", web::get().to(health_check))
        .route("/snapshot/", web::get().to(get_snapshot))
        .route("/snapshot", web::get().to(get_snapshot));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        has_snapshot: state.store.has_snapshot(),
    })
}

/// Snapshot endpoint
///
/// GET /api/snapshot/?drivers=&users=&max_count=&regen_seconds=&match_ratio=&force=&seed=&meta=
///
/// Response body:
/// ```json
/// {
///   "drivers": [{"id": "driver_1", "lat": 35.7, "lng": 51.4}],
///   "users": [{"id": "user_1", "lat": 35.7, "lng": 51.4}],
///   "matchs": [{"driver": "driver_1", "user": "user_1"}]
/// }
/// ```
async fn get_snapshot(
    state: web::Data<AppState>,
    query: web::Query<SnapshotQuery>,
) -> impl Responder {
    let params = match resolve(&query, &state.defaults) {
        Ok(params) => params,
        Err(e) => {
            tracing::info!("Rejected snapshot request: {}", e);
            return error_response(&e);
        }
    };

    match state.store.get(&params).await {
        Ok(snapshot) => HttpResponse::Ok().json(SnapshotResponse::from_snapshot(
            &snapshot,
            params.include_meta,
            params.regen_seconds,
        )),
        Err(e) => {
            tracing::error!("Failed to produce snapshot: {}", e);
            error_response(&e)
        }
    }
}

fn error_response(err: &SnapshotError) -> HttpResponse {
    match err {
        SnapshotError::InvalidParameter { field, .. } => HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_parameter".to_string(),
            message: err.to_string(),
            field: Some(field.clone()),
            status_code: 400,
        }),
        SnapshotError::GenerationFailure(_) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "generation_failure".to_string(),
            message: err.to_string(),
            field: None,
            status_code: 500,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_invalid_parameter_maps_to_bad_request() {
        let response = error_response(&SnapshotError::invalid("drivers", "bad"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_generation_failure_maps_to_server_error() {
        let response = error_response(&SnapshotError::GenerationFailure("boom".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
