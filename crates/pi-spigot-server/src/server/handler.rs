//! HTTP routes: `POST /calculate` and `GET /health`.
//!
//! Requests are validated here before any work reaches the pool. Compute
//! failures are logged and answered with an empty `500`.

use super::error::ApiError;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use pi_spigot::{DigitEngine, WorkerPool, compute_digits};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Body of `POST /calculate`.
///
/// Both fields are optional at the parsing level so that a missing field gets
/// its own message instead of a generic deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalculateRequest {
    pub x: Option<i64>,
    pub n: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub pi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub workers: usize,
}

/// Shared state behind every route.
pub struct AppState<E: DigitEngine> {
    pool: Arc<WorkerPool<E>>,
    max_digits: u64,
    serving: Arc<AtomicBool>,
}

impl<E: DigitEngine> AppState<E> {
    pub fn new(pool: Arc<WorkerPool<E>>, max_digits: u64) -> Self {
        Self {
            pool,
            max_digits,
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flips `/health` to `not_serving`. Shared by every clone of the state.
    pub fn mark_not_serving(&self) {
        self.serving.store(false, Ordering::Release);
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire) && !self.pool.is_shutdown()
    }
}

// Derived `Clone` would require `E: Clone`.
impl<E: DigitEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            max_digits: self.max_digits,
            serving: Arc::clone(&self.serving),
        }
    }
}

/// Builds the service router with CORS and request tracing.
pub fn router<E: DigitEngine>(state: AppState<E>) -> Router {
    Router::new()
        .route("/calculate", post(calculate::<E>))
        .route("/health", get(health::<E>))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Validates a request and returns `(n, x)`.
///
/// Checks run in a fixed order and the first failure wins: a present but
/// out-of-range `x`, then a present but out-of-range `n`, then a missing `x`,
/// a missing `n`, and finally `n < x`.
pub fn validate(request: &CalculateRequest, max_digits: u64) -> Result<(u64, u64), ApiError> {
    let bad = |message: String| ApiError::BadRequest(message);
    let in_range =
        |value: i64, max: u64| u64::try_from(value).is_ok_and(|v| (1..=max).contains(&v));

    if request.x.is_some_and(|x| !in_range(x, u64::MAX)) {
        return Err(bad(
            "x must be an integer value greater than or equal to 1.".into(),
        ));
    }

    if request.n.is_some_and(|n| !in_range(n, max_digits)) {
        return Err(bad(format!(
            "n must be an integer value greater than or equal to 1 and less than {}.",
            max_digits.saturating_add(1)
        )));
    }

    let x = request
        .x
        .and_then(|x| u64::try_from(x).ok())
        .ok_or_else(|| bad("x value missing from request.".into()))?;
    let n = request
        .n
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| bad("n value missing from request.".into()))?;

    if n < x {
        return Err(bad(
            "n digits must be greater than or equal to x.".into(),
        ));
    }

    Ok((n, x))
}

async fn calculate<E: DigitEngine>(
    State(state): State<AppState<E>>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let Json(request) = payload?;
    let (n, x) = validate(&request, state.max_digits)?;

    match compute_digits(&state.pool, n, x).await {
        Ok(pi) => Ok(Json(CalculateResponse { pi })),
        Err(e) => {
            tracing::error!(n, x, "Digit computation failed: {e}");
            Err(ApiError::Internal)
        }
    }
}

async fn health<E: DigitEngine>(
    State(state): State<AppState<E>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.is_serving() {
        (StatusCode::OK, "serving")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_serving")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_owned(),
            workers: state.pool.size(),
        }),
    )
}
