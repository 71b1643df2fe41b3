//! Axum server setup and router configuration.

use crate::api;
use crate::state::AppState;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use notifd_core::processors::IngestStatsSnapshot;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/stats", get(stats))
        .merge(api::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready check response.
#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    database: &'static str,
}

/// Readiness check - verifies the database answers.
async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(db) = &state.db else {
        return (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                database: "disabled",
            }),
        );
    };

    match db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                database: "connected",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not ready",
                    database: "unreachable",
                }),
            )
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    ingest: IngestStatsSnapshot,
    subscribers: usize,
}

/// Ingest counters and the number of live subscriber connections.
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        ingest: state.ingest_stats.snapshot(),
        subscribers: state.registry.len(),
    })
}

/// Run the server until `shutdown` completes, then stop accepting
/// connections and wait for open responses to finish.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use futures_util::StreamExt;
    use notifd_core::config::SubscriberConfig;
    use notifd_core::processors::IngestStats;
    use notifd_core::registry::SubscriberRegistry;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(SubscriberRegistry::new()),
            Arc::new(IngestStats::default()),
            SubscriberConfig::default(),
            None,
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(test_state()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_without_database() {
        let response = build_router(test_state()).oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sse_requires_user_id() {
        let router = build_router(test_state());
        let missing = router.clone().oneshot(get("/sse")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let blank = router.oneshot(get("/sse?userId=%20")).await.unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sse_streams_pushes_and_unregisters_on_drop() {
        let state = test_state();
        let registry = state.registry.clone();

        let response = build_router(state).oneshot(get("/sse?userId=u1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert!(registry.is_connected("u1"));

        registry.push("u1", "hello").unwrap();
        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"data: hello\n\n");

        drop(body);
        assert!(!registry.is_connected("u1"));
    }

    #[tokio::test]
    async fn test_replaced_sse_stream_ends() {
        let state = test_state();
        let registry = state.registry.clone();
        let router = build_router(state);

        let first = router.clone().oneshot(get("/sse?userId=u1")).await.unwrap();
        let second = router.oneshot(get("/sse?userId=u1")).await.unwrap();

        let mut first_body = first.into_body().into_data_stream();
        assert!(first_body.next().await.is_none());
        drop(first_body);
        // Cleanup of the replaced stream leaves the newer connection alone.
        assert!(registry.is_connected("u1"));

        registry.push("u1", "only-newest").unwrap();
        let mut second_body = second.into_body().into_data_stream();
        let frame = second_body.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"data: only-newest\n\n");
    }

    #[tokio::test]
    async fn test_stats_reports_live_subscribers() {
        let state = test_state();
        let router = build_router(state);

        let _subscription = router.clone().oneshot(get("/sse?userId=u1")).await.unwrap();
        let response = router.oneshot(get("/stats")).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["subscribers"], 1);
        assert_eq!(json["ingest"]["received"], 0);
        assert_eq!(json["ingest"]["decodeFailures"], 0);
    }
}
