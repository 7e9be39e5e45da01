use async_trait::async_trait;
use serde::Deserialize;

use super::{ProviderError, VoiceSmsProvider};

// Twilio REST API client (messages + calls)
#[derive(Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Deserialize)]
struct CreatedResource {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioClient {
    pub fn new(http: reqwest::Client, base_url: &str, account_sid: &str, auth_token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}.json",
            self.base_url, self.account_sid, resource
        )
    }

    async fn create(&self, resource: &str, form: &[(&str, &str)]) -> Result<String, ProviderError> {
        let res = self
            .http
            .post(self.resource_url(resource))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<CreatedResource>().await?.sid);
        }

        let message = match res.json::<TwilioErrorBody>().await {
            Ok(TwilioErrorBody {
                code: Some(code),
                message: Some(message),
            }) => format!("{message} (code {code})"),
            Ok(TwilioErrorBody {
                message: Some(message),
                ..
            }) => message,
            _ => format!("Twilio returned status {}", status.as_u16()),
        };
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl VoiceSmsProvider for TwilioClient {
    async fn send_sms(&self, from: &str, to: &str, body: &str) -> Result<String, ProviderError> {
        self.create("Messages", &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    async fn place_call(&self, from: &str, to: &str, twiml: &str) -> Result<String, ProviderError> {
        self.create("Calls", &[("To", to), ("From", from), ("Twiml", twiml)])
            .await
    }
}
