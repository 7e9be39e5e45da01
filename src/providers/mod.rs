//! External collaborators of the alert pipeline.
//!
//! The handler only sees these traits; `supabase` and `twilio` hold the HTTP
//! implementations used in production.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AuthenticatedUser, ProfileRow};

pub mod supabase;
pub mod twilio;

pub use supabase::SupabaseClient;
pub use twilio::TwilioClient;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("token rejected with status {0}")]
    Rejected(u16),

    #[error("identity request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("profile lookup returned status {0}")]
    Status(u16),

    #[error("profile request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    // Message as returned by the provider, surfaced to the caller verbatim
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Exchanges a bearer token for the user it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, token: &str) -> Result<AuthenticatedUser, IdentityError>;
}

/// Reads stored emergency contacts. `Ok(None)` means the user has no row.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn emergency_contacts(&self, user_id: &str) -> Result<Option<ProfileRow>, ProfileError>;
}

/// Voice and SMS delivery. Both operations return the provider's id.
#[async_trait]
pub trait VoiceSmsProvider: Send + Sync {
    async fn send_sms(&self, from: &str, to: &str, body: &str) -> Result<String, ProviderError>;

    async fn place_call(&self, from: &str, to: &str, twiml: &str) -> Result<String, ProviderError>;
}
