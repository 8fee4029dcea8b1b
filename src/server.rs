//! HTTP boundary for the link checker.
//!
//! `POST /validate-url` takes `{url, deepValidation?}` and answers
//! `{isValid, metadata, fromCache}`. Bad input is a 400 and an internal
//! failure a 500, both with an `{error}` body.

use crate::cache::CacheStore;
use crate::checker::LinkChecker;
use crate::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "deep_by_default")]
    pub deep_validation: bool,
}

fn deep_by_default() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Builds the router around a shared checker.
pub fn router<S: CacheStore + 'static>(checker: Arc<LinkChecker<S>>) -> Router {
    Router::new()
        .route("/validate-url", post(validate_url::<S>).options(preflight))
        .layer(CorsLayer::permissive())
        .with_state(checker)
}

/// Binds `bind` and serves until the process is stopped.
pub async fn serve<S: CacheStore + 'static>(bind: &str, checker: Arc<LinkChecker<S>>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Validation service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(checker)).await?;
    Ok(())
}

async fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

#[instrument(skip(checker, body))]
async fn validate_url<S: CacheStore + 'static>(
    State(checker): State<Arc<LinkChecker<S>>>,
    body: Bytes,
) -> Response {
    let request: ValidateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)),
    };

    let Some(url) = request.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: url");
    };

    if !request.deep_validation {
        return Json(checker.check_syntax(&url)).into_response();
    }

    let task = tokio::spawn(async move { checker.check(&url, false).await });
    match task.await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!("Validation task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal validation failure")
        }
    }
}
