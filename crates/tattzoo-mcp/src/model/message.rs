use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ErrorData, JsonObject, ProgressNotificationMethod, RequestId, serde_impl};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotificationParam {
    #[serde(deserialize_with = "serde_impl::request_id")]
    pub request_id: RequestId,
    #[serde(default)]
    pub message: String,
    #[serde(deserialize_with = "serde_impl::progress")]
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub id: RequestId,
    pub error: ErrorData,
}

/// A message received on the event stream, classified once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerJsonRpcMessage {
    Progress(ProgressNotificationParam),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

/// Why an inbound event was discarded without touching any pending call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    InvalidJson(String),
    InvalidProgress(String),
    MissingId,
    UnrecognizedShape,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::InvalidJson(e) => write!(f, "invalid json: {e}"),
            DropReason::InvalidProgress(e) => write!(f, "invalid progress notification: {e}"),
            DropReason::MissingId => f.write_str("missing numeric id"),
            DropReason::UnrecognizedShape => f.write_str("unrecognized message shape"),
        }
    }
}

/// An event-stream payload that could not be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedMessage {
    pub reason: DropReason,
    pub raw: String,
}

impl ServerJsonRpcMessage {
    /// Parse the `data` field of one `message` event.
    pub fn parse(data: &str) -> Result<Self, DroppedMessage> {
        let dropped = |reason| DroppedMessage {
            reason,
            raw: data.to_owned(),
        };
        let value = serde_json::from_str::<Value>(data)
            .map_err(|e| dropped(DropReason::InvalidJson(e.to_string())))?;
        Self::from_value(value).map_err(dropped)
    }

    pub fn from_value(value: Value) -> Result<Self, DropReason> {
        let Value::Object(mut object) = value else {
            return Err(DropReason::UnrecognizedShape);
        };
        if object.get("method").and_then(Value::as_str) == Some(ProgressNotificationMethod::VALUE)
        {
            let params = object.remove("params").unwrap_or(Value::Null);
            return serde_json::from_value::<ProgressNotificationParam>(params)
                .map(ServerJsonRpcMessage::Progress)
                .map_err(|e| DropReason::InvalidProgress(e.to_string()));
        }
        let Some(id) = object.get("id").and_then(Value::as_u64) else {
            return Err(DropReason::MissingId);
        };
        if let Some(result) = take_non_null(&mut object, "result") {
            return Ok(ServerJsonRpcMessage::Response(JsonRpcResponse { id, result }));
        }
        if let Some(error) = take_non_null(&mut object, "error") {
            return serde_json::from_value::<ErrorData>(error)
                .map(|error| ServerJsonRpcMessage::Error(JsonRpcError { id, error }))
                .map_err(|_| DropReason::UnrecognizedShape);
        }
        Err(DropReason::UnrecognizedShape)
    }

    /// The request this message refers to.
    pub fn request_id(&self) -> RequestId {
        match self {
            ServerJsonRpcMessage::Progress(progress) => progress.request_id,
            ServerJsonRpcMessage::Response(response) => response.id,
            ServerJsonRpcMessage::Error(error) => error.id,
        }
    }
}

fn take_non_null(object: &mut JsonObject, key: &str) -> Option<Value> {
    object.remove(key).filter(|value| !value.is_null())
}
