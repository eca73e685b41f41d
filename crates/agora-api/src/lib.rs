//! # agora-api: Axum HTTP Service for Agora
//!
//! Exposes the ledger's poll, vote, consultation and audit operations over
//! HTTP. Every request is scoped to the tenant in the caller's token.
//!
//! ## API Surface
//!
//! | Prefix                  | Module                       |
//! |-------------------------|------------------------------|
//! | `/v1/polls/*`           | [`routes::polls`]            |
//! | `/v1/consultations/*`, `/v1/ideas/*` | [`routes::consultations`] |
//! | `/v1/audit/*`           | [`routes::audit`]            |
//! | `/health/*`, `/metrics` | unauthenticated health checks |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Largest accepted request body; audit bundles posted for verification are
/// the biggest payloads.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks and `/metrics` are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::polls::router())
        .merge(routes::consultations::router())
        .merge(routes::audit::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(state.metrics.clone()))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness check: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 503 when a configured database is unreachable.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = db::ping(pool).await {
            tracing::warn!(error = %e, "readiness check failed: database unreachable");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
        }
    }
    (StatusCode::OK, "ready")
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}


#[cfg(test)]
mod tests {
    use super::testkit::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_checks_need_no_credentials() {
        let app = test_app();
        assert_eq!(send_raw(&app, "GET", "/health/liveness", None, None).await, (StatusCode::OK, "ok".into()));
        assert_eq!(send_raw(&app, "GET", "/health/readiness", None, None).await, (StatusCode::OK, "ready".into()));
    }

    #[tokio::test]
    async fn api_needs_credentials() {
        let app = test_app();
        let (status, _) = send(&app, "GET", "/v1/polls/P1", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn metrics_count_api_requests() {
        let app = test_app();
        send(&app, "GET", "/v1/polls/P1", None, None).await;
        send(&app, "GET", "/v1/polls/P1", Some(&official()), None).await;
        let (status, text) = send_raw(&app, "GET", "/metrics", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("agora_http_requests_total 2\n"), "{text}");
        assert!(text.contains("agora_http_client_errors_total 2\n"), "{text}");
    }
}
