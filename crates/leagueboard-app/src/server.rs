// HTTP API: cached league data, forced refresh, and the front-page shell.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use leagueboard_core::MatchdayCache;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub cache: Arc<MatchdayCache>,
    pub default_matchday: u32,
}

#[derive(Debug, Deserialize)]
pub struct MatchdayParams {
    pub md: Option<u32>,
}

impl MatchdayParams {
    fn matchday(&self, state: &ApiState) -> u32 {
        self.md.unwrap_or(state.default_matchday)
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/data", get(data))
        .route("/api/refresh", post(refresh))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /api/data?md=N`: cached result, built on first access.
async fn data(State(state): State<ApiState>, Query(params): Query<MatchdayParams>) -> Response {
    let matchday = params.matchday(&state);
    match state.cache.get_or_build(matchday).await {
        Ok(result) => Json(&*result).into_response(),
        Err(e) => {
            warn!(matchday, "data request failed: {e}");
            error_response("Failed to fetch data")
        }
    }
}

/// `POST /api/refresh?md=N`: rebuild regardless of cache state.
async fn refresh(State(state): State<ApiState>, Query(params): Query<MatchdayParams>) -> Response {
    let matchday = params.matchday(&state);
    info!(matchday, "manual refresh requested");
    match state.cache.force_refresh(matchday).await {
        Ok(result) => Json(json!({
            "status": "ok",
            "lastUpdated": result.timestamp.to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            warn!(matchday, "manual refresh failed: {e}");
            error_response("Refresh failed")
        }
    }
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
