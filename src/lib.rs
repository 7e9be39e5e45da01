//! Emergency alert service for the Healix wellness dashboard.
//!
//! A signed-in user presses the emergency button; the client snapshots the
//! best device location and posts it here. The service authenticates the
//! caller, applies a per-client rate limit, validates the coordinates and
//! sends both an SMS and a voice call through Twilio.
//!
//! Every alert goes to one pre-verified destination number (a restriction of
//! Twilio trial accounts). The caller's own emergency contacts are written
//! into the message text instead of being dialed.
//!
//! # Endpoints
//!
//! - `POST /api/emergency/call-and-sms`: dispatch an alert
//! - `GET /health`
//! - `GET /metrics`: Prometheus text format
//!
//! # Configuration
//!
//! Secrets are read from the environment: `TWILIO_ACCOUNT_SID`,
//! `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER`, `TWILIO_VERIFIED_NUMBER`,
//! `SUPABASE_URL`, `SUPABASE_ANON_KEY`. The server starts without them but
//! answers alerts with 500 until they are set. Logging honours `RUST_LOG`.
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geolocation;
pub mod handlers;
pub mod location;
pub mod message;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use handlers::{emergency_handler, health_handler, method_not_allowed, metrics_handler};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            client::ALERT_PATH,
            post(emergency_handler).get(method_not_allowed),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn get_text(uri: &str) -> (StatusCode, String) {
        let res = app(Harness::default().state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = get_text("/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn metrics_expose_alert_counters() {
        metrics::ALERT_REQUESTS.inc();
        let (status, body) = get_text("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healix_alert_requests_total"));
    }
}
