//! In-process doubles for the alert pipeline's collaborators.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{AlertSettings, Secrets};
use crate::models::{AuthenticatedUser, ProfileRow};
use crate::providers::{
    IdentityError, IdentityProvider, ProfileError, ProfileStore, ProviderError, VoiceSmsProvider,
};
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter};
use crate::state::AppState;

pub const GOOD_TOKEN: &str = "good-token";
pub const SENDER: &str = "+15005550006";
pub const VERIFIED: &str = "+919800000000";

pub fn full_secrets() -> Secrets {
    Secrets {
        twilio_account_sid: Some("AC123".into()),
        twilio_auth_token: Some("secret".into()),
        twilio_phone_number: Some(SENDER.into()),
        twilio_verified_number: Some(VERIFIED.into()),
        supabase_url: Some("https://db.example".into()),
        supabase_key: Some("anon".into()),
    }
}

pub struct MockIdentity {
    pub metadata: Value,
    pub calls: AtomicUsize,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self {
            metadata: json!({
                "full_name": "Asha Rao",
                "emergency_phone_1": "+919811111111"
            }),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn get_user(&self, token: &str) -> Result<AuthenticatedUser, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if token != GOOD_TOKEN {
            return Err(IdentityError::Rejected(401));
        }
        Ok(AuthenticatedUser {
            id: "user-1".into(),
            email: Some("asha@example.com".into()),
            user_metadata: self.metadata.clone(),
        })
    }
}

#[derive(Default)]
pub enum MockProfiles {
    #[default]
    NoRow,
    Row(ProfileRow),
    Failing,
}

#[async_trait]
impl ProfileStore for MockProfiles {
    async fn emergency_contacts(&self, _user_id: &str) -> Result<Option<ProfileRow>, ProfileError> {
        match self {
            MockProfiles::NoRow => Ok(None),
            MockProfiles::Row(row) => Ok(Some(row.clone())),
            MockProfiles::Failing => Err(ProfileError::Status(500)),
        }
    }
}

#[derive(Default)]
pub struct MockProvider {
    pub sms_error: Option<String>,
    pub call_error: Option<String>,
    pub sms_calls: AtomicUsize,
    pub voice_calls: AtomicUsize,
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl MockProvider {
    pub fn total_calls(&self) -> usize {
        self.sms_calls.load(Ordering::SeqCst) + self.voice_calls.load(Ordering::SeqCst)
    }

    fn outcome(&self, error: &Option<String>, sid: &str) -> Result<String, ProviderError> {
        match error {
            Some(message) => Err(ProviderError::Rejected {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(sid.to_string()),
        }
    }
}

#[async_trait]
impl VoiceSmsProvider for MockProvider {
    async fn send_sms(&self, from: &str, to: &str, body: &str) -> Result<String, ProviderError> {
        self.sms_calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), body.to_string()));
        self.outcome(&self.sms_error, "SM0001")
    }

    async fn place_call(&self, from: &str, to: &str, twiml: &str) -> Result<String, ProviderError> {
        self.voice_calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), twiml.to_string()));
        self.outcome(&self.call_error, "CA0001")
    }
}

// Wraps the real limiter and counts how often it is consulted
pub struct CountingLimiter {
    pub inner: InMemoryRateLimiter,
    pub checks: AtomicUsize,
}

impl CountingLimiter {
    pub fn new(max_requests: u32) -> Self {
        Self {
            inner: InMemoryRateLimiter::new(max_requests, Duration::from_secs(300)),
            checks: AtomicUsize::new(0),
        }
    }
}

impl RateLimiter for CountingLimiter {
    fn allow(&self, identifier: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.allow(identifier)
    }
}

pub struct Harness {
    pub identity: Arc<MockIdentity>,
    pub profiles: Arc<MockProfiles>,
    pub provider: Arc<MockProvider>,
    pub limiter: Arc<CountingLimiter>,
    pub secrets: Secrets,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            identity: Arc::new(MockIdentity::default()),
            profiles: Arc::new(MockProfiles::default()),
            provider: Arc::new(MockProvider::default()),
            limiter: Arc::new(CountingLimiter::new(3)),
            secrets: full_secrets(),
        }
    }
}

impl Harness {
    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            settings: AlertSettings {
                secrets: self.secrets.clone(),
                rate_limit: 3,
                rate_window: Duration::from_secs(300),
                timezone: FixedOffset::east_opt(330 * 60).unwrap(),
                timezone_label: "IST".into(),
            },
            identity: self.identity.clone(),
            profiles: self.profiles.clone(),
            provider: self.provider.clone(),
            rate_limiter: self.limiter.clone(),
        })
    }
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached at {}", Utc::now());
}
