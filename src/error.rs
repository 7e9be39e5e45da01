use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::{DispatchResult, ErrorBody};

pub const VERIFIED_NUMBER_HINT: &str = "Check that TWILIO_VERIFIED_NUMBER is verified with the Twilio account and that TWILIO_PHONE_NUMBER can reach it.";

// Every way an alert request can be rejected
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Emergency service not configured")]
    NotConfigured,

    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid authentication")]
    InvalidToken,

    #[error("Too many emergency requests. Please wait {wait_minutes} minutes before trying again.")]
    RateLimited { wait_minutes: u64 },

    #[error("Invalid request body")]
    MalformedBody,

    #[error("Location data is required")]
    MissingLocation,

    #[error("Latitude and longitude must be valid numbers")]
    NonNumericLocation,

    #[error(
        "Invalid location coordinates: latitude must be between -90 and 90, longitude must be between -180 and 180"
    )]
    OutOfRange,

    #[error("Failed to send emergency notifications")]
    Provider {
        message: String,
        sms: Vec<DispatchResult>,
        calls: Vec<DispatchResult>,
    },
}

impl AlertError {
    pub fn status(&self) -> StatusCode {
        match self {
            AlertError::NotConfigured | AlertError::Provider { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AlertError::MissingToken | AlertError::InvalidToken => StatusCode::UNAUTHORIZED,
            AlertError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AlertError::MalformedBody
            | AlertError::MissingLocation
            | AlertError::NonNumericLocation
            | AlertError::OutOfRange => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();

        let body = match self {
            AlertError::Provider {
                message,
                sms,
                calls,
            } => ErrorBody {
                error,
                details: Some(message),
                hint: Some(VERIFIED_NUMBER_HINT.to_string()),
                sms,
                calls,
            },
            _ => ErrorBody {
                error,
                ..ErrorBody::default()
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(AlertError::NotConfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AlertError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AlertError::RateLimited { wait_minutes: 5 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AlertError::OutOfRange.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_message_names_the_wait() {
        let message = AlertError::RateLimited { wait_minutes: 5 }.to_string();
        assert!(message.contains("wait 5 minutes"));
    }
}
