//! HTTP API request handlers
//!
//! Each handler turns a request into a queued scrape task and maps the
//! typed outcome onto a status code. A definitive miss is 404, an exhausted
//! tab pool is 502 (the upstream browser could not serve us), everything
//! else is 500.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, error};
use url::Url;

use crate::pool::SessionPool;
use crate::queue::{ScrapeTask, TaskQueue};
use crate::scrape::FetchError;

use super::types::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<TaskQueue>,
    pub pool: Arc<SessionPool>,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Pool and queue occupancy
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        pool: state.pool.stats().await,
        active_tasks: state.queue.active_count(),
        queued_tasks: state.queue.queued_count(),
    })
}

/// Profile lookup by player identifier
pub async fn profile(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> axum::response::Response {
    debug!(identifier, hint = ?query.id, "Profile request");
    run_task(&state, ScrapeTask::profile(identifier, query.id)).await
}

/// Legacy direct-URL lookup. The original deployment answered a missing
/// `url` field with 404, and clients check for exactly that.
pub async fn user(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> axum::response::Response {
    let Some(url) = request.url else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Request body carries no url")),
        )
            .into_response();
    };
    if Url::parse(&url).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!("Not a valid URL: {url}"))),
        )
            .into_response();
    }
    debug!(url, "Direct URL request");
    run_task(&state, ScrapeTask::direct_url(url)).await
}

async fn run_task(state: &AppState, task: ScrapeTask) -> axum::response::Response {
    match state.queue.submit(task).await {
        Ok(Ok(shaped)) => (StatusCode::OK, Json(shaped)).into_response(),
        Ok(Err(e)) => fetch_error_response(e),
        Err(_) => {
            error!("Scrape task was dropped without an answer");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error(
                    "Task was dropped before completion",
                )),
            )
                .into_response()
        }
    }
}

fn fetch_error_response(e: FetchError) -> axum::response::Response {
    let (status, body) = match &e {
        FetchError::NotFound => (
            StatusCode::NOT_FOUND,
            ErrorResponse::not_found(e.to_string()),
        ),
        FetchError::PoolExhausted(_) => (
            StatusCode::BAD_GATEWAY,
            ErrorResponse::new("POOL_EXHAUSTED", e.to_string()),
        ),
        _ => {
            error!("Scrape failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::internal_error(e.to_string()),
            )
        }
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: FetchError) -> StatusCode {
        fetch_error_response(e).status()
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_of(FetchError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn pool_exhaustion_maps_to_502() {
        assert_eq!(
            status_of(FetchError::PoolExhausted("timeout".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn everything_else_maps_to_500() {
        let e = FetchError::RetriesExhausted {
            attempts: 3,
            last_error: "nav timeout".to_string(),
        };
        assert_eq!(status_of(e), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(FetchError::InvalidUrl("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
