use std::sync::Arc;

use crate::config::AlertSettings;
use crate::providers::{IdentityProvider, ProfileStore, VoiceSmsProvider};
use crate::rate_limit::RateLimiter;

// app's shared state, collaborators are injected so tests can swap them
pub struct AppState {
    pub settings: AlertSettings,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub provider: Arc<dyn VoiceSmsProvider>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}
