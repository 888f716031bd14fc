use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::contact::{self, ContactForm, FieldErrors};
use crate::dashboard::Snapshot;
use crate::location::{AttemptFailure, LocationResult};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/location ───────────────────────────────────────────

#[derive(Serialize)]
struct UnavailableBody {
    error: &'static str,
    retry: bool,
    attempts: Vec<AttemptFailure>,
}

pub async fn location(State(state): State<Arc<AppState>>) -> Result<Json<LocationResult>, Response> {
    let start = Instant::now();
    let resolved = state
        .dashboard
        .resolver()
        .resolve_with_cancel(&state.shutdown)
        .await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match resolved {
        Ok(loc) => {
            tracing::info!(method = %loc.method, place = %loc.place_line(), elapsed_ms, "GET /api/location");
            Ok(Json(loc))
        }
        Err(unresolved) => {
            tracing::info!(attempts = unresolved.attempts.len(), elapsed_ms, "GET /api/location -> unavailable");
            let body = UnavailableBody {
                error: "location unavailable",
                retry: true,
                attempts: unresolved.attempts,
            };
            Err((StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response())
        }
    }
}

// ─── GET /api/dashboard ──────────────────────────────────────────

pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Snapshot>, ApiError> {
    state
        .dashboard
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "Dashboard has not been refreshed yet"))
}

// ─── POST /api/refresh ───────────────────────────────────────────

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<Snapshot>, ApiError> {
    let start = Instant::now();
    let snapshot = state
        .dashboard
        .refresh_if_idle(&state.shutdown)
        .await
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "A refresh is already in progress"))?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/refresh"
    );
    Ok(Json(snapshot))
}

// ─── POST /api/contact/validate ──────────────────────────────────

#[derive(Serialize)]
struct ValidationBody {
    valid: bool,
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    errors: FieldErrors,
}

pub async fn validate_contact(Json(form): Json<ContactForm>) -> Response {
    match contact::validate(&form) {
        Ok(()) => Json(ValidationBody {
            valid: true,
            errors: FieldErrors::default(),
        })
        .into_response(),
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationBody { valid: false, errors }),
        )
            .into_response(),
    }
}
