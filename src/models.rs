use serde::{Deserialize, Serialize};
use serde_json::Value;

// Alert request body. Fields stay untyped until validation so that numeric
// strings can be coerced and a mistyped optional field cannot reject the alert.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
    // Nested `{latitude, longitude, accuracy}`; anything but an object is ignored
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub accuracy: Option<Value>,
    // Only used when it is a string
    #[serde(default)]
    pub user_message: Option<Value>,
}

/// Validated coordinates, already rounded to 6 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

// Identity provider user record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

// Row of the `users` table holding emergency contacts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRow {
    #[serde(default)]
    pub emergency_phone_1: Option<String>,
    #[serde(default)]
    pub emergency_phone_2: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Contact details rendered into the alert text. Never used as a delivery target.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyContactSnapshot {
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub display_name: String,
}

impl EmergencyContactSnapshot {
    pub fn numbers(&self) -> Vec<&str> {
        [&self.primary_phone, &self.secondary_phone]
            .into_iter()
            .filter_map(|n| n.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Call,
}

// Outcome of one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub channel: Channel,
    pub success: bool,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEcho {
    pub latitude: f64,
    pub longitude: f64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

// Body of a 200 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResponse {
    pub success: bool,
    pub message: String,
    pub sms: Vec<DispatchResult>,
    pub calls: Vec<DispatchResult>,
    pub location: LocationEcho,
    pub note: String,
}

// Body of every non-200 response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sms: Vec<DispatchResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<DispatchResult>,
}
