pub const HEADER_SESSION_ID: &str = "Mcp-Session-Id";
pub const HEADER_LAST_EVENT_ID: &str = "Last-Event-ID";
pub const QUERY_SESSION_ID: &str = "sessionId";
pub const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";
pub const JSON_MIME_TYPE: &str = "application/json";
/// `Accept` value for requests whose outcome may be streamed.
pub const ACCEPT_JSON_AND_EVENT_STREAM: &str = "application/json, text/event-stream";
/// SSE event name carrying protocol messages; unnamed events default to it.
pub const MESSAGE_EVENT: &str = "message";
