//! Wire types for the subset of MCP spoken by the tool-call client.
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod content;
mod message;
mod serde_impl;
pub use content::*;
pub use message::*;

/// A JSON object, as used for tool arguments and capabilities.
pub type JsonObject<F = Value> = serde_json::Map<String, F>;

/// Correlation identifier minted by the client for every outbound request.
pub type RequestId = u64;

macro_rules! const_string {
    ($name:ident = $value:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl $name {
            pub const VALUE: &'static str = $value;
            pub const fn as_str(&self) -> &'static str {
                $value
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                $value.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<$name, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s: Cow<'de, str> = Deserialize::deserialize(deserializer)?;
                if s == $value {
                    Ok($name)
                } else {
                    Err(serde::de::Error::custom(format!(
                        "expect const string value \"{}\", got \"{}\"",
                        $value, s
                    )))
                }
            }
        }
    };
}

const_string!(JsonRpcVersion2_0 = "2.0");
const_string!(InitializeRequestMethod = "initialize");
const_string!(CallToolRequestMethod = "tools/call");
const_string!(ProgressNotificationMethod = "notifications/progress");

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(Cow<'static, str>);

impl ProtocolVersion {
    pub const V_2025_03_26: Self = Self(Cow::Borrowed("2025-03-26"));
    pub const LATEST: Self = Self::V_2025_03_26;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name and version a client announces during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for Implementation {
    fn default() -> Self {
        Self::new("tattzoo-web", "1.0.0")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestParam {
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub capabilities: JsonObject,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequestParam {
    pub name: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<JsonObject>,
}

/// A method together with its params, serialized as `{"method": .., "params": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<M, P> {
    pub method: M,
    pub params: P,
}

impl<M: Default, P> Request<M, P> {
    pub fn new(params: P) -> Self {
        Self {
            method: M::default(),
            params,
        }
    }
}

pub type InitializeRequest = Request<InitializeRequestMethod, InitializeRequestParam>;
pub type CallToolRequest = Request<CallToolRequestMethod, CallToolRequestParam>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientRequest {
    InitializeRequest(InitializeRequest),
    CallToolRequest(CallToolRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest<R = ClientRequest> {
    pub jsonrpc: JsonRpcVersion2_0,
    pub id: RequestId,
    #[serde(flatten)]
    pub request: R,
}

pub type ClientJsonRpcMessage = JsonRpcRequest<ClientRequest>;

impl ClientJsonRpcMessage {
    pub fn request(request: ClientRequest, id: RequestId) -> Self {
        JsonRpcRequest {
            jsonrpc: JsonRpcVersion2_0,
            id,
            request,
        }
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self.request, ClientRequest::InitializeRequest(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const INVALID_REQUEST: Self = Self(-32600);
    pub const METHOD_NOT_FOUND: Self = Self(-32601);
    pub const INVALID_PARAMS: Self = Self(-32602);
    pub const INTERNAL_ERROR: Self = Self(-32603);
}

/// Error object carried by a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorData {
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}
