//! HTTP surface: feed creation and RSS reads.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailfeed_core::FeedStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::rate_limit::{self, RateLimiter};

const LANDING_PAGE: &str = include_str!("landing.html");

/// Builds the application router.
pub fn router(store: Arc<FeedStore>, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route(
            "/rss",
            post(create_feed).layer(middleware::from_fn_with_state(limiter, rate_limit::limit)),
        )
        .route("/rss/:id", get(read_feed))
        .layer(middleware::from_fn(log_request))
        .with_state(store)
}

#[derive(Debug, Deserialize)]
struct CreateFeed {
    name: String,
}

#[derive(Debug, Serialize)]
struct Created {
    email: String,
}

/// Handler failures and the status each maps to.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(mailfeed_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "Feed not found\n").into_response(),
            Self::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error\n").into_response()
            }
        }
    }
}

impl From<mailfeed_core::Error> for ApiError {
    fn from(e: mailfeed_core::Error) -> Self {
        Self::Internal(e)
    }
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn create_feed(
    State(store): State<Arc<FeedStore>>,
    body: Bytes,
) -> Result<Json<Created>, ApiError> {
    let request: CreateFeed = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}\n")))?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Feed name must not be empty\n".into()));
    }

    let record = store.create_feed(name).await?;
    Ok(Json(Created { email: record.id }))
}

async fn read_feed(
    State(store): State<Arc<FeedStore>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let xml = store.render(&id)?.ok_or(ApiError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "application/rss+xml")], xml).into_response())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis(),
        "request"
    );
    response
}
