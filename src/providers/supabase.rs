use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::{IdentityError, IdentityProvider, ProfileError, ProfileStore};
use crate::models::{AuthenticatedUser, ProfileRow};

const PROFILE_COLUMNS: &str = "emergency_phone_1,emergency_phone_2,full_name";

// Supabase auth + PostgREST over plain HTTP
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_user(&self, token: &str) -> Result<AuthenticatedUser, IdentityError> {
        let res = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(IdentityError::Rejected(res.status().as_u16()));
        }
        Ok(res.json::<AuthenticatedUser>().await?)
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn emergency_contacts(&self, user_id: &str) -> Result<Option<ProfileRow>, ProfileError> {
        let id_filter = format!("eq.{user_id}");
        let res = self
            .http
            .get(format!("{}/rest/v1/users", self.base_url))
            .query(&[("select", PROFILE_COLUMNS), ("id", id_filter.as_str())])
            .header("apikey", &self.api_key)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ProfileError::Status(res.status().as_u16()));
        }

        let rows = res.json::<Vec<ProfileRow>>().await?;
        debug!(rows = rows.len(), "profile lookup finished");
        Ok(rows.into_iter().next())
    }
}
