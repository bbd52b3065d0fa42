use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{delete, get, post},
    Json, Router,
};
use calc::{metrics::LatencyPercentiles, RenderRequest, SessionId};
use serde::Serialize;

use crate::{state::AppState, view::RenderResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/static/styles.css", get(styles))
        .route("/static/app.js", get(script))
        .route("/sessions", post(start_session))
        .route("/sessions/:id", delete(end_session))
        .route("/sessions/:id/render", post(render))
        .route("/metrics/fetch-latency", get(fetch_latency))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(ui::index_html())
}

async fn styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], ui::styles_css())
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        ui::app_js(),
    )
}

#[derive(Debug, Serialize)]
struct StartSessionResponse {
    session_id: SessionId,
}

async fn start_session(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let session_id = state
        .start_session()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let location = format!("/sessions/{session_id}");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(StartSessionResponse { session_id }),
    ))
}

async fn render(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, StatusCode> {
    let page = state.render(id, request).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(page.into()))
}

async fn end_session(State(state): State<AppState>, Path(id): Path<SessionId>) -> StatusCode {
    if state.end_session(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
struct FetchLatencyResponse {
    fetch_latency: Option<LatencyPercentiles>,
}

async fn fetch_latency(State(state): State<AppState>) -> Json<FetchLatencyResponse> {
    Json(FetchLatencyResponse {
        fetch_latency: state.fetch_latency(),
    })
}
