use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::cache::NewsCache;
use crate::dispatch::DigestDispatcher;
use crate::fetcher::NewsItem;
use crate::scheduler::run_digest_job;
use crate::subscribers::SubscriberStore;

pub struct AppState {
    pub cache: Arc<NewsCache>,
    pub dispatcher: Arc<DigestDispatcher>,
    pub subscribers: Arc<SubscriberStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news", get(get_news))
        .route("/api/refresh-cache", post(refresh_cache))
        .route("/api/run-now", post(run_now))
        .route(
            "/api/subscribers",
            get(list_subscribers)
                .post(add_subscriber)
                .delete(remove_subscriber),
        )
        .route("/health", get(health))
        .with_state(state)
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Read path; may refresh synchronously when the snapshot is stale.
pub async fn get_news(State(state): State<Arc<AppState>>) -> Json<Vec<NewsItem>> {
    Json(state.cache.get_or_refresh().await)
}

/// Fire-and-forget cache refresh.
pub async fn refresh_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.cache.force_refresh_async();
    Json(json!({"status": "Background refresh started"}))
}

/// Fire-and-forget refresh-and-dispatch using the current subscriber set.
pub async fn run_now(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tokio::spawn(run_digest_job(
        state.cache.clone(),
        state.dispatcher.clone(),
        state.subscribers.clone(),
    ));
    Json(json!({"status": "Job started"}))
}

#[derive(Deserialize)]
pub struct EmailPayload {
    pub email: Option<String>,
}

pub async fn list_subscribers(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeSet<String>> {
    Json(state.subscribers.load())
}

pub async fn add_subscriber(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailPayload>,
) -> Result<Response, AppError> {
    let Some(email) = payload.email.filter(|e| !e.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Email is required"})),
        )
            .into_response());
    };

    let subscribers = state.subscribers.add(&email)?;
    Ok(Json(subscribers).into_response())
}

pub async fn remove_subscriber(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<BTreeSet<String>>, AppError> {
    let subscribers = match payload.email {
        Some(email) => state.subscribers.remove(&email)?,
        None => state.subscribers.load(),
    };
    Ok(Json(subscribers))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
