use serde_json::Value;

use crate::error::AlertError;
use crate::models::{AlertRequest, Coordinates};

const MAPS_BASE_URL: &str = "https://www.google.com/maps?q=";

// Round to 6 decimal places (~10 cm). Adding 0.0 turns -0.0 into 0.0.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0 + 0.0
}

pub fn maps_url(coords: Coordinates) -> String {
    format!("{}{},{}", MAPS_BASE_URL, coords.latitude, coords.longitude)
}

enum Coerced {
    Missing,
    Invalid,
    Number(f64),
}

// JSON numbers and numeric strings are accepted
fn coerce(value: Option<&Value>) -> Coerced {
    match value {
        None | Some(Value::Null) => Coerced::Missing,
        Some(Value::Number(n)) => n.as_f64().map_or(Coerced::Invalid, Coerced::Number),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_or(Coerced::Invalid, Coerced::Number),
        Some(_) => Coerced::Invalid,
    }
}

impl AlertRequest {
    pub fn parse(body: &[u8]) -> Result<Self, AlertError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|_| AlertError::MalformedBody)
    }

    // Field of the nested `location` object; None when it is not an object
    fn nested(&self, key: &str) -> Option<&Value> {
        self.location.as_ref().and_then(|l| l.get(key))
    }

    /// Validates and rounds the coordinates, preferring top-level fields over
    /// the nested `location` object.
    pub fn coordinates(&self) -> Result<Coordinates, AlertError> {
        let latitude = self.latitude.as_ref().or_else(|| self.nested("latitude"));
        let longitude = self.longitude.as_ref().or_else(|| self.nested("longitude"));

        let (latitude, longitude) = match (coerce(latitude), coerce(longitude)) {
            (Coerced::Missing, _) | (_, Coerced::Missing) => {
                return Err(AlertError::MissingLocation);
            }
            (Coerced::Number(lat), Coerced::Number(lon)) if lat.is_finite() && lon.is_finite() => {
                (lat, lon)
            }
            _ => return Err(AlertError::NonNumericLocation),
        };

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AlertError::OutOfRange);
        }

        Ok(Coordinates {
            latitude: round6(latitude),
            longitude: round6(longitude),
        })
    }

    /// Reported accuracy in meters, ignored when unusable.
    pub fn accuracy(&self) -> Option<f64> {
        let raw = self.accuracy.as_ref().or_else(|| self.nested("accuracy"));
        match coerce(raw) {
            Coerced::Number(meters) if meters.is_finite() && meters >= 0.0 => Some(meters),
            _ => None,
        }
    }

    pub fn user_message(&self) -> Option<&str> {
        self.user_message
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}
