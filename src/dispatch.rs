//! The emergency alert pipeline.
//!
//! Gates run in a fixed order and each one short-circuits: configuration,
//! authentication, profile lookup, rate limit, payload validation. Only a
//! request that passes all of them reaches the provider. SMS and call are
//! then attempted independently; one failing never cancels the other.

use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::DispatchRoute;
use crate::error::AlertError;
use crate::location::maps_url;
use crate::message::{MessageContext, compose};
use crate::metrics::{
    ALERTS_RATE_LIMITED, CALLS_PLACED, DISPATCH_LATENCY, PROVIDER_FAILURES, SMS_SENT,
};
use crate::models::{
    AlertRequest, AlertResponse, AuthenticatedUser, Channel, DispatchResult,
    EmergencyContactSnapshot, LocationEcho, ProfileRow,
};
use crate::providers::ProviderError;
use crate::rate_limit::client_identifier;
use crate::state::AppState;

const FALLBACK_NAME: &str = "Healix user";

/// Raw pieces of an incoming alert request.
pub struct AlertInput<'a> {
    pub authorization: Option<&'a str>,
    pub forwarded_for: Option<&'a str>,
    pub body: &'a [u8],
}

// Token of a `Bearer` authorization header; the scheme is case-insensitive
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn metadata_str<'a>(metadata: &'a Value, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

/// Builds the contact snapshot from the profile row, falling back to the
/// identity provider's metadata field by field.
pub fn contact_snapshot(row: Option<&ProfileRow>, user: &AuthenticatedUser) -> EmergencyContactSnapshot {
    let meta = &user.user_metadata;
    let pick = |from_row: Option<&str>, key: &str| {
        non_blank(from_row).or_else(|| non_blank(metadata_str(meta, key)))
    };

    let primary_phone = pick(
        row.and_then(|r| r.emergency_phone_1.as_deref()),
        "emergency_phone_1",
    );
    let secondary_phone = pick(
        row.and_then(|r| r.emergency_phone_2.as_deref()),
        "emergency_phone_2",
    );
    let display_name = pick(row.and_then(|r| r.full_name.as_deref()), "full_name")
        .or_else(|| non_blank(user.email.as_deref()))
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    EmergencyContactSnapshot {
        primary_phone,
        secondary_phone,
        display_name,
    }
}

// A failed lookup degrades the message text, it never blocks the alert
async fn resolve_contacts(state: &AppState, user: &AuthenticatedUser) -> EmergencyContactSnapshot {
    let row = match state.profiles.emergency_contacts(&user.id).await {
        Ok(row) => {
            if row.is_none() {
                warn!(user_id = %user.id, "no profile row, using auth metadata");
            }
            row
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "profile lookup failed, using auth metadata");
            None
        }
    };
    contact_snapshot(row.as_ref(), user)
}

fn record(channel: Channel, to: &str, outcome: Result<String, ProviderError>) -> DispatchResult {
    match outcome {
        Ok(sid) => {
            match channel {
                Channel::Sms => SMS_SENT.inc(),
                Channel::Call => CALLS_PLACED.inc(),
            }
            DispatchResult {
                channel,
                success: true,
                to: to.to_string(),
                sid: Some(sid),
                error: None,
            }
        }
        Err(e) => {
            PROVIDER_FAILURES.inc();
            error!(?channel, error = %e, "provider call failed");
            DispatchResult {
                channel,
                success: false,
                to: to.to_string(),
                sid: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn routing_note(route: &DispatchRoute, contacts: &EmergencyContactSnapshot) -> String {
    let numbers = contacts.numbers();
    let listed = if numbers.is_empty() {
        "no emergency contacts on file".to_string()
    } else {
        format!("emergency contacts {}", numbers.join(", "))
    };
    format!(
        "Alerts are delivered to the verified emergency line {}; the user's {} are included in the message text.",
        route.to, listed
    )
}

pub async fn dispatch_alert(state: &AppState, input: AlertInput<'_>) -> Result<AlertResponse, AlertError> {
    let route = state.settings.secrets.dispatch_route().map_err(|missing| {
        error!(?missing, "emergency service is missing configuration");
        AlertError::NotConfigured
    })?;

    let token = bearer_token(input.authorization).ok_or(AlertError::MissingToken)?;
    let user = state.identity.get_user(token).await.map_err(|e| {
        warn!(error = %e, "bearer token rejected");
        AlertError::InvalidToken
    })?;

    let contacts = resolve_contacts(state, &user).await;

    let identifier = client_identifier(input.forwarded_for);
    if !state.rate_limiter.allow(&identifier) {
        ALERTS_RATE_LIMITED.inc();
        warn!(%identifier, user_id = %user.id, "alert rate limited");
        return Err(AlertError::RateLimited {
            wait_minutes: state.settings.rate_window_minutes(),
        });
    }

    let request = AlertRequest::parse(input.body)?;
    let coordinates = request.coordinates()?;
    let accuracy = request.accuracy();
    let location_url = maps_url(coordinates);

    let message = compose(&MessageContext {
        contacts: &contacts,
        coordinates,
        location_url: &location_url,
        accuracy,
        user_message: request.user_message(),
        sent_at: Utc::now().with_timezone(&state.settings.timezone),
        timezone_label: &state.settings.timezone_label,
    });

    info!(
        user_id = %user.id,
        latitude = coordinates.latitude,
        longitude = coordinates.longitude,
        "dispatching emergency alert"
    );

    let started = Instant::now();
    let (sms, call) = tokio::join!(
        state.provider.send_sms(&route.from, &route.to, &message.sms_body),
        state.provider.place_call(&route.from, &route.to, &message.voice_twiml),
    );
    DISPATCH_LATENCY.observe(started.elapsed().as_secs_f64());

    let sms = record(Channel::Sms, &route.to, sms);
    let call = record(Channel::Call, &route.to, call);

    if !sms.success && !call.success {
        let message = sms
            .error
            .clone()
            .or_else(|| call.error.clone())
            .unwrap_or_default();
        return Err(AlertError::Provider {
            message,
            sms: vec![sms],
            calls: vec![call],
        });
    }

    let summary = if sms.success && call.success {
        "Emergency notifications sent"
    } else {
        "Emergency notifications partially sent"
    };

    Ok(AlertResponse {
        success: true,
        message: summary.to_string(),
        note: routing_note(&route, &contacts),
        sms: vec![sms],
        calls: vec![call],
        location: LocationEcho {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            url: location_url,
            accuracy,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(metadata: Value) -> AuthenticatedUser {
        AuthenticatedUser {
            id: "user-1".into(),
            email: Some("asha@example.com".into()),
            user_metadata: metadata,
        }
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(Some("BEARER  abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(Some("abc.def")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer   ")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn profile_row_wins_over_metadata() {
        let row = ProfileRow {
            emergency_phone_1: Some("+919811111111".into()),
            emergency_phone_2: None,
            full_name: Some("Asha Rao".into()),
        };
        let snapshot = contact_snapshot(
            Some(&row),
            &user(json!({"emergency_phone_1": "+910000000000", "emergency_phone_2": "+919822222222"})),
        );
        assert_eq!(snapshot.primary_phone.as_deref(), Some("+919811111111"));
        assert_eq!(snapshot.secondary_phone.as_deref(), Some("+919822222222"));
        assert_eq!(snapshot.display_name, "Asha Rao");
    }

    #[test]
    fn missing_row_falls_back_to_metadata_then_email() {
        let snapshot = contact_snapshot(None, &user(json!({"emergency_phone_2": "+919822222222"})));
        assert_eq!(snapshot.primary_phone, None);
        assert_eq!(snapshot.secondary_phone.as_deref(), Some("+919822222222"));
        assert_eq!(snapshot.display_name, "asha@example.com");

        let anonymous = AuthenticatedUser {
            id: "user-2".into(),
            email: None,
            user_metadata: Value::Null,
        };
        assert_eq!(contact_snapshot(None, &anonymous).display_name, FALLBACK_NAME);
    }
}
