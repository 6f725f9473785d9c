//! Lenient number decoding for server-sent notifications.
//!
//! Servers in the wild send `requestId` and `progress` either as JSON numbers
//! or as numeric strings; both are accepted.
use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value;

fn number_like<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("invalid numeric string {text:?}: {e}"))),
        other => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

pub(super) fn request_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = number_like(deserializer)?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(D::Error::custom(format!("invalid request id {value}")))
    }
}

pub(super) fn progress<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = number_like(deserializer)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(D::Error::custom("progress must be finite"))
    }
}
