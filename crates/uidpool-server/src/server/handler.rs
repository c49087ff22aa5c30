//! HTTP routes over a shared [`Pool`].
//!
//! | Route            | Action                         | Success            |
//! |------------------|--------------------------------|--------------------|
//! | `GET /id`        | consume one ID                 | `200` text body    |
//! | `POST /maintain` | run one maintenance pass       | `200` JSON outcome |
//! | `DELETE /pool`   | flush the pool                 | `204`              |
//! | `GET /stats`     | current pool size and watermark| `200` JSON         |
//! | `GET /healthz`   | liveness                       | `200`              |
//!
//! Failures are mapped by [`ApiError`].

use crate::server::telemetry::{increment_ids_served, increment_pool_exhausted};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use uidpool::{Error, IdSource, MaintainOutcome, Pool, PoolStore};

/// Shared handler state. Cloned per request; the pool itself is a set of
/// cheap handles.
pub struct AppState<S, G> {
    pool: Pool<S, G>,
}

impl<S: Clone, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<S, G> AppState<S, G> {
    pub const fn new(pool: Pool<S, G>) -> Self {
        Self { pool }
    }
}

pub fn router<S, G>(state: AppState<S, G>) -> Router
where
    S: PoolStore,
    G: IdSource,
{
    Router::new()
        .route("/id", get(next_id::<S, G>))
        .route("/maintain", post(maintain::<S, G>))
        .route("/pool", delete(flush::<S, G>))
        .route("/stats", get(stats::<S, G>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn next_id<S, G>(State(state): State<AppState<S, G>>) -> Result<String, ApiError>
where
    S: PoolStore,
    G: IdSource,
{
    match state.pool.consume().await {
        Ok(id) => {
            increment_ids_served();
            Ok(id.to_string())
        }
        Err(e) => {
            if e.is_exhausted() {
                increment_pool_exhausted();
            }
            Err(ApiError(e))
        }
    }
}

async fn maintain<S, G>(
    State(state): State<AppState<S, G>>,
) -> Result<Json<MaintainResponse>, ApiError>
where
    S: PoolStore,
    G: IdSource,
{
    let outcome = state.pool.maintainer().maintain().await?;
    Ok(Json(outcome.into()))
}

async fn flush<S, G>(State(state): State<AppState<S, G>>) -> Result<StatusCode, ApiError>
where
    S: PoolStore,
    G: IdSource,
{
    state.pool.flush().await?;
    tracing::info!(pool = state.pool.config().pool_key(), "pool flushed");
    Ok(StatusCode::NO_CONTENT)
}

async fn stats<S, G>(State(state): State<AppState<S, G>>) -> Result<Json<StatsResponse>, ApiError>
where
    S: PoolStore,
    G: IdSource,
{
    let size = state.pool.len().await?;
    let config = state.pool.config();
    Ok(Json(StatsResponse {
        pool_key: config.pool_key().to_owned(),
        size,
        threshold: config.threshold(),
    }))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MaintainResponse {
    Skipped { size: u64 },
    Refilled { size: u64, pushed: usize },
}

impl From<MaintainOutcome> for MaintainResponse {
    fn from(outcome: MaintainOutcome) -> Self {
        match outcome {
            MaintainOutcome::Skipped { size } => Self::Skipped { size },
            MaintainOutcome::Refilled { size, pushed } => Self::Refilled { size, pushed },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub pool_key: String,
    pub size: u64,
    pub threshold: u64,
}

/// Maps [`uidpool::Error`] onto HTTP status codes.
///
/// - `Exhausted` -> `503 Service Unavailable` (the client may retry)
/// - `Store`, `Generator` -> `502 Bad Gateway` (an upstream dependency failed)
/// - `LockContended` -> `409 Conflict` (a refill is already running)
/// - anything else -> `500 Internal Server Error`
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Store(_) | Error::Generator(_) => StatusCode::BAD_GATEWAY,
            Error::LockContended { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "request failed: {}", self.0);
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected: {}", self.0);
        }

        (status, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use core::convert::Infallible;
    use core::time::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tower::ServiceExt;
    use uidpool::{FnSource, MemoryStore, PoolConfig, PoolStore, Uid};

    type TestSource = FnSource<Box<dyn Fn() -> Result<Vec<Uid>, Infallible> + Send + Sync>>;

    fn config(threshold: u64) -> PoolConfig {
        PoolConfig::builder("test:ids")
            .threshold(threshold)
            .retry_times(2)
            .retry_sleep(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn counting_source(batch: i64) -> TestSource {
        let next = Arc::new(AtomicI64::new(1));
        FnSource::new(Box::new(move || {
            let start = next.fetch_add(batch, Ordering::SeqCst);
            Ok((start..start + batch).collect())
        }))
    }

    fn app(store: &MemoryStore, threshold: u64, source: TestSource) -> Router {
        let pool = Pool::new(config(threshold), store.clone(), source);
        router(AppState::new(pool))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn id_refills_empty_pool_and_returns_text() {
        let store = MemoryStore::new();
        let app = app(&store, 10, counting_source(4));

        let (status, body) = call(app, "GET", "/id").await;
        assert_eq!(status, StatusCode::OK);
        let id: Uid = String::from_utf8(body).unwrap().parse().unwrap();
        assert!((1..=4).contains(&id));
        assert_eq!(store.list("test:ids").len(), 3);
    }

    #[tokio::test]
    async fn id_reports_exhaustion_as_unavailable() {
        let store = MemoryStore::new();
        let app = app(&store, 10, counting_source(0));

        let (status, body) = call(app, "GET", "/id").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(String::from_utf8(body).unwrap().contains("exhausted"));
    }

    #[tokio::test]
    async fn id_reports_store_failure_as_bad_gateway() {
        let store = MemoryStore::new();
        // A plain value under the pool key makes every list operation fail.
        store
            .set_if_absent("test:ids", "oops", Duration::from_secs(60))
            .await
            .unwrap();
        let app = app(&store, 10, counting_source(4));

        let (status, _) = call(app, "GET", "/id").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn maintain_returns_outcome_json() {
        let store = MemoryStore::new();
        let app = app(&store, 5, counting_source(8));

        let (status, body) = call(app.clone(), "POST", "/maintain").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["outcome"], "refilled");
        assert_eq!(json["size"], 0);
        assert_eq!(json["pushed"], 8);

        let (status, body) = call(app, "POST", "/maintain").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["size"], 8);
    }

    #[tokio::test]
    async fn maintain_conflicts_while_lock_is_held() {
        let store = MemoryStore::new();
        store
            .set_if_absent("test:ids:lock", "elsewhere", Duration::from_secs(60))
            .await
            .unwrap();
        let app = app(&store, 5, counting_source(8));

        let (status, _) = call(app, "POST", "/maintain").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(store.list("test:ids").is_empty());
    }

    #[tokio::test]
    async fn flush_then_stats_reports_empty_pool() {
        let store = MemoryStore::new();
        store
            .push_front_batch("test:ids", &[1, 2, 3])
            .await
            .unwrap();
        let app = app(&store, 7, counting_source(4));

        let (status, body) = call(app.clone(), "GET", "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["pool_key"], "test:ids");
        assert_eq!(json["size"], 3);
        assert_eq!(json["threshold"], 7);

        let (status, body) = call(app.clone(), "DELETE", "/pool").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        // Flushing an already empty pool is fine.
        let (status, _) = call(app.clone(), "DELETE", "/pool").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(app, "GET", "/stats").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["size"], 0);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let store = MemoryStore::new();
        let (status, body) = call(app(&store, 1, counting_source(1)), "GET", "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
