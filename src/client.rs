//! Client side of the emergency button.
//!
//! Checks the session, snapshots one fix from the tracker, posts it to the
//! alert endpoint and turns the outcome into a status line for the user.
//! Coordinates are not validated here; the server's 400 is authoritative.

use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::geolocation::{DEFAULT_FRESHNESS, GeoFix, LocationTracker};
use crate::models::{AlertResponse, ErrorBody};

pub const ALERT_PATH: &str = "/api/emergency/call-and-sms";
const USER_MESSAGE: &str = "Emergency assistance needed! User has pressed the emergency button.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Sent,
    Partial,
    Failed,
    NotSignedIn,
    NoLocation,
    RateLimited,
    Unauthorized,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct AlertStatus {
    pub outcome: AlertOutcome,
    pub message: String,
    pub successful_sms: usize,
    pub successful_calls: usize,
    pub fix: Option<GeoFix>,
}

impl AlertStatus {
    fn new(outcome: AlertOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
            successful_sms: 0,
            successful_calls: 0,
            fix: None,
        }
    }

    fn with_fix(mut self, fix: &GeoFix) -> Self {
        self.fix = Some(fix.clone());
        self
    }
}

pub struct AlertClient {
    http: reqwest::Client,
    endpoint: String,
    freshness: Duration,
}

impl AlertClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), ALERT_PATH),
            freshness: DEFAULT_FRESHNESS,
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Runs one alert attempt. Every path produces a user-facing message;
    /// retrying is left to the user pressing the button again.
    pub async fn trigger(&self, access_token: Option<&str>, tracker: &LocationTracker) -> AlertStatus {
        let Some(token) = access_token.filter(|t| !t.is_empty()) else {
            return AlertStatus::new(
                AlertOutcome::NotSignedIn,
                "Please log in to use emergency feature.",
            );
        };

        // snapshot once; later tracker updates do not affect this alert
        let fix = match tracker.fix_for_dispatch(self.freshness).await {
            Ok(fix) => fix,
            Err(e) => {
                return AlertStatus::new(
                    AlertOutcome::NoLocation,
                    format!("Could not get your location. {}", e.guidance()),
                );
            }
        };

        let result = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({
                "latitude": fix.latitude,
                "longitude": fix.longitude,
                "accuracy": fix.accuracy,
                "userMessage": USER_MESSAGE,
            }))
            .send()
            .await;

        let res = match result {
            Ok(res) => res,
            Err(e) => {
                warn!(error = %e, "alert request failed");
                return AlertStatus::new(
                    AlertOutcome::Failed,
                    "Network error. Please call emergency services directly.",
                )
                .with_fix(&fix);
            }
        };

        let status = res.status();
        if status.is_success() {
            return match res.json::<AlertResponse>().await {
                Ok(body) => sent_status(&body, &fix),
                Err(e) => {
                    warn!(error = %e, "unreadable alert response");
                    AlertStatus::new(
                        AlertOutcome::Partial,
                        "Emergency request processed but the response could not be read. Please call emergency services to confirm.",
                    )
                    .with_fix(&fix)
                }
            };
        }

        let error = res.json::<ErrorBody>().await.ok();
        rejected_status(status, error).with_fix(&fix)
    }
}

fn freshness_text(fix: &GeoFix) -> String {
    format!(
        "Location accuracy ±{} m, fix {} s old.",
        fix.accuracy.round(),
        fix.age(chrono::Utc::now()).as_secs()
    )
}

fn sent_status(body: &AlertResponse, fix: &GeoFix) -> AlertStatus {
    let successful_sms = body.sms.iter().filter(|r| r.success).count();
    let successful_calls = body.calls.iter().filter(|r| r.success).count();
    info!(successful_sms, successful_calls, "alert dispatched");

    let (outcome, message) = if successful_sms == 0 && successful_calls == 0 {
        (
            AlertOutcome::Partial,
            "Emergency request processed but alerts may have failed. Please call emergency services directly.".to_string(),
        )
    } else {
        let outcome = if successful_sms == body.sms.len() && successful_calls == body.calls.len() {
            AlertOutcome::Sent
        } else {
            AlertOutcome::Partial
        };
        (
            outcome,
            format!(
                "Emergency alerts sent! {successful_calls} call(s) and {successful_sms} SMS sent successfully. {}",
                freshness_text(fix)
            ),
        )
    };

    AlertStatus {
        outcome,
        message,
        successful_sms,
        successful_calls,
        fix: Some(fix.clone()),
    }
}

fn rejected_status(status: StatusCode, error: Option<ErrorBody>) -> AlertStatus {
    let server_message = error.map(|e| e.error).filter(|e| !e.is_empty());
    match status.as_u16() {
        429 => AlertStatus::new(
            AlertOutcome::RateLimited,
            "Too many emergency requests. Please wait a few minutes.",
        ),
        401 => AlertStatus::new(
            AlertOutcome::Unauthorized,
            "Authentication error. Please log in again.",
        ),
        400 => AlertStatus::new(
            AlertOutcome::Rejected,
            server_message.unwrap_or_else(|| "Invalid emergency request.".to_string()),
        ),
        _ => AlertStatus::new(
            AlertOutcome::Failed,
            server_message
                .unwrap_or_else(|| "Failed to send emergency alerts. Please call manually.".to_string()),
        ),
    }
}
