use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use std::time::Duration;

use crate::rate_limit::MAX_WINDOW;

// CLI argument structure, secrets come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "healix-alert")]
#[command(about = "Emergency call and SMS dispatch service for Healix")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Rate limit max alerts per window per client
    #[arg(long, default_value_t = 3)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 300)]
    pub rate_window: u64,

    // How often expired rate limit records are purged, in seconds
    #[arg(long, default_value_t = 60)]
    pub purge_interval: u64,

    // Offset of the timezone used for alert timestamps (minutes east of UTC)
    #[arg(long, default_value_t = 330, allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,

    // Label printed after alert timestamps
    #[arg(long, default_value = "IST")]
    pub timezone_label: String,

    // Twilio REST base url
    #[arg(long, env = "TWILIO_API_URL", default_value = "https://api.twilio.com")]
    pub twilio_api_url: String,

    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    pub twilio_account_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    // Sender number owned by the Twilio account
    #[arg(long, env = "TWILIO_PHONE_NUMBER")]
    pub twilio_phone_number: Option<String>,

    // The single pre-verified destination every alert is delivered to
    #[arg(long, env = "TWILIO_VERIFIED_NUMBER")]
    pub twilio_verified_number: Option<String>,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,
}

impl Args {
    pub fn secrets(&self) -> Secrets {
        Secrets {
            twilio_account_sid: self.twilio_account_sid.clone(),
            twilio_auth_token: self.twilio_auth_token.clone(),
            twilio_phone_number: self.twilio_phone_number.clone(),
            twilio_verified_number: self.twilio_verified_number.clone(),
            supabase_url: self.supabase_url.clone(),
            supabase_key: self.supabase_key.clone(),
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            secrets: self.secrets(),
            rate_limit: self.rate_limit,
            rate_window: Duration::from_secs(self.rate_window).min(MAX_WINDOW),
            timezone: self.timezone(),
            timezone_label: self.timezone_label.clone(),
        }
    }
}

// Deployment secrets. Any of them may be absent; the alert endpoint refuses
// to dispatch until all are set.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub twilio_verified_number: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

/// Sender and recipient for every alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRoute {
    pub from: String,
    pub to: String,
}

impl Secrets {
    /// Names of the required settings that are unset or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("TWILIO_ACCOUNT_SID", &self.twilio_account_sid),
            ("TWILIO_AUTH_TOKEN", &self.twilio_auth_token),
            ("TWILIO_PHONE_NUMBER", &self.twilio_phone_number),
            ("TWILIO_VERIFIED_NUMBER", &self.twilio_verified_number),
            ("SUPABASE_URL", &self.supabase_url),
            ("SUPABASE_ANON_KEY", &self.supabase_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn dispatch_route(&self) -> Result<DispatchRoute, Vec<&'static str>> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(DispatchRoute {
            from: self.twilio_phone_number.clone().unwrap_or_default(),
            to: self.twilio_verified_number.clone().unwrap_or_default(),
        })
    }
}

// Settings the alert pipeline reads on every request
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub secrets: Secrets,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub timezone: FixedOffset,
    pub timezone_label: String,
}

impl AlertSettings {
    // Rounded up so a 90 second window still reads "2 minutes"
    pub fn rate_window_minutes(&self) -> u64 {
        self.rate_window.as_secs().div_ceil(60).max(1)
    }
}
