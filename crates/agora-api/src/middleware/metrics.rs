//! # Request Metrics
//!
//! In-process request counters using atomics, exposed as plain text on
//! `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Shared metrics state. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests served.
    pub fn requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx status.
    pub fn client_errors(&self) -> u64 {
        self.inner.client_errors.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status.
    pub fn server_errors(&self) -> u64 {
        self.inner.server_errors.load(Ordering::Relaxed)
    }

    /// Count one response.
    pub fn record(&self, status: axum::http::StatusCode) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() {
            self.inner.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.inner.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Text exposition, one `name value` pair per line.
    pub fn render(&self) -> String {
        format!(
            "agora_http_requests_total {}\nagora_http_client_errors_total {}\nagora_http_server_errors_total {}\n",
            self.requests(),
            self.client_errors(),
            self.server_errors(),
        )
    }
}

/// Middleware that counts every response.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}
