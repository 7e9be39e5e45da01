use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::dispatch::{AlertInput, dispatch_alert};
use crate::error::AlertError;
use crate::metrics::{ALERT_REQUESTS, ALERTS_REJECTED};
use crate::models::{AlertResponse, ErrorBody};
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

// The body is taken as raw bytes so that auth and rate limiting run before
// any JSON parsing
pub async fn emergency_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AlertResponse>, AlertError> {
    ALERT_REQUESTS.inc();

    let input = AlertInput {
        authorization: headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        forwarded_for: headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()),
        body: &body,
    };

    dispatch_alert(&state, input).await.map(Json).map_err(|e| {
        if !matches!(e, AlertError::Provider { .. }) {
            ALERTS_REJECTED.inc();
        }
        e
    })
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "Method not allowed".to_string(),
            ..ErrorBody::default()
        }),
    )
}
