use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use chrono::{DateTime, Utc};
use led_board_core::board::BoardPhase;
use led_board_core::config::Viewport;
use led_board_core::source::{SuggestionOutcome, Suggestions};
use led_board_core::BoardController;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::page;

#[derive(Clone)]
pub struct AppState {
    pub board: Arc<BoardController>,
    pub suggestions: Arc<Suggestions>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/board", get(board_fragment))
        .route("/state", get(board_state))
        .route("/stop", post(set_stop))
        .route("/viewport", post(set_viewport))
        .route("/suggestions", get(suggestions))
        .route("/health", get(health))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub phase: BoardPhase,
    pub is_loading: bool,
    pub has_error: bool,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub stop_query: Option<String>,
    pub station: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub stop: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

async fn index(State(app): State<AppState>) -> Response {
    let frame = app.board.frame().await;
    let refresh_secs = app.board.config().refresh_interval().as_secs().max(1);
    let viewport = app.board.viewport().await;
    let html = page::render_page(&frame, app.board.stop_query().await.as_deref(), viewport, refresh_secs);
    (
        [(header::CACHE_CONTROL, "no-store")],
        Html(html),
    )
        .into_response()
}

async fn board_fragment(State(app): State<AppState>) -> Html<String> {
    Html(page::render_board(&*app.board.frame().await))
}

async fn board_state(State(app): State<AppState>) -> Json<StateResponse> {
    Json(current_state(&app.board).await)
}

async fn current_state(board: &BoardController) -> StateResponse {
    let state = board.state().await;
    StateResponse {
        phase: state.phase,
        is_loading: state.is_loading(),
        has_error: state.has_error(),
        last_refresh_at: state.last_refresh_at,
        stop_query: board.stop_query().await,
        station: board.frame().await.station().map(str::to_owned),
    }
}

async fn set_stop(State(app): State<AppState>, Json(request): Json<StopRequest>) -> Response {
    if request.stop.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "stop must not be empty").into_response();
    }
    if app.board.set_stop_query(&request.stop).await {
        app.board.refresh().await;
    }
    Json(current_state(&app.board).await).into_response()
}

async fn set_viewport(State(app): State<AppState>, Json(viewport): Json<Viewport>) -> Response {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !(valid(viewport.width) && valid(viewport.height)) {
        return (StatusCode::BAD_REQUEST, "width and height must be positive").into_response();
    }
    if app.board.set_viewport(viewport).await {
        app.board.refresh().await;
    }
    Json(current_state(&app.board).await).into_response()
}

async fn suggestions(State(app): State<AppState>, Query(query): Query<SuggestionQuery>) -> Json<SuggestionOutcome> {
    Json(app.suggestions.suggest(&query.q).await)
}

async fn health() -> &'static str {
    "OK"
}
