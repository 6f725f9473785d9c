//! Content parts returned by a tool call.
//!
//! Only the text part carries the payload the client cares about; the other
//! kinds are modeled so that a result mixing several parts still decodes.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImageContent {
    /// The base64-encoded image
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAudioContent {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawContent {
    Text(RawTextContent),
    Image(RawImageContent),
    Audio(RawAudioContent),
    #[serde(other)]
    Unsupported,
}

pub type Content = RawContent;

impl RawContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        RawContent::Text(RawTextContent { text: text.into() })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&RawTextContent> {
        match self {
            RawContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// The `result` object of a `tools/call` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    pub fn success(content: Vec<Content>) -> Self {
        CallToolResult {
            content,
            structured_content: None,
            is_error: Some(false),
        }
    }

    /// The first part tagged `text`, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(RawContent::as_text)
            .map(|text| text.text.as_str())
    }

    /// Decode the payload carried by the first text part.
    ///
    /// The text is parsed as JSON; when that fails the literal string is used.
    /// Returns `None` when the result has no text part.
    pub fn payload(&self) -> Option<Value> {
        self.first_text().map(decode_text)
    }

    /// Decode a raw `result` value straight into its payload.
    ///
    /// Parts are inspected one by one, so a malformed part of another kind
    /// does not hide a usable text part. A result whose `content` is not a
    /// list, or that has no `text` part with a string `text`, yields `None`.
    pub fn decode_payload(result: Value) -> Option<Value> {
        result
            .get("content")?
            .as_array()?
            .iter()
            .find_map(|part| match part.get("type").and_then(Value::as_str) {
                Some("text") => part.get("text").and_then(Value::as_str),
                _ => None,
            })
            .map(decode_text)
    }
}

fn decode_text(text: &str) -> Value {
    serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}
