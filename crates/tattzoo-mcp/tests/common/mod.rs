#![allow(dead_code)]
use std::{
    io,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::{StreamExt, channel::mpsc};
use serde_json::{Value, json};
use sse_stream::{Error as SseError, Sse};
use tattzoo_mcp::{
    model::{CallToolRequestParam, ClientJsonRpcMessage, ClientRequest, RequestId},
    transport::{
        BoxedSseResponse, StreamableHttpClient, StreamableHttpError, StreamableHttpPostResponse,
        streamable_http_client::CustomHeaders,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Reacts to a dispatched tool call by pushing events onto the open stream.
pub type Responder = Arc<dyn Fn(&ScriptedHttpClient, RequestId, &CallToolRequestParam) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub message: ClientJsonRpcMessage,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedStreamRequest {
    pub session_id: Option<String>,
    pub last_event_id: Option<String>,
}

#[derive(Default)]
struct State {
    handshake_header: Option<String>,
    handshake_body: Option<Value>,
    failing_handshakes: usize,
    reject_tool_calls: bool,
    refuse_streams: bool,
    responder: Option<Responder>,
    posts: Vec<RecordedPost>,
    stream_requests: Vec<RecordedStreamRequest>,
    stream: Option<mpsc::UnboundedSender<Result<Sse, SseError>>>,
}

/// An in-memory HTTP stack that plays the server side of the protocol.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient {
    state: Arc<Mutex<State>>,
}

impl ScriptedHttpClient {
    /// A server that assigns `session_id` through the response header.
    pub fn with_session(session_id: &str) -> Self {
        let client = Self::default();
        client.state().handshake_header = Some(session_id.to_owned());
        client
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn handshake_body(self, body: Value) -> Self {
        self.state().handshake_body = Some(body);
        self
    }

    /// Make the next `count` handshakes fail.
    pub fn fail_handshakes(self, count: usize) -> Self {
        self.state().failing_handshakes = count;
        self
    }

    pub fn reject_tool_calls(self) -> Self {
        self.state().reject_tool_calls = true;
        self
    }

    pub fn respond_with(
        self,
        responder: impl Fn(&ScriptedHttpClient, RequestId, &CallToolRequestParam) + Send + Sync + 'static,
    ) -> Self {
        self.state().responder = Some(Arc::new(responder));
        self
    }

    /// Refuse every further subscription attempt.
    pub fn refuse_streams(&self) {
        self.state().refuse_streams = true;
    }

    /// Undo [`ScriptedHttpClient::refuse_streams`].
    pub fn accept_streams(&self) {
        self.state().refuse_streams = false;
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.state().posts.clone()
    }

    pub fn initialize_count(&self) -> usize {
        self.state()
            .posts
            .iter()
            .filter(|post| post.message.is_initialize())
            .count()
    }

    /// Tool calls received so far, as `(id, name, arguments)`.
    pub fn tool_calls(&self) -> Vec<(RequestId, String, Value)> {
        self.state()
            .posts
            .iter()
            .filter_map(|post| match &post.message.request {
                ClientRequest::CallToolRequest(request) => Some((
                    post.message.id,
                    request.params.name.to_string(),
                    Value::Object(request.params.arguments.clone().unwrap_or_default()),
                )),
                ClientRequest::InitializeRequest(_) => None,
            })
            .collect()
    }

    pub fn stream_requests(&self) -> Vec<RecordedStreamRequest> {
        self.state().stream_requests.clone()
    }

    pub async fn wait_for_tool_calls(&self, count: usize) -> Vec<(RequestId, String, Value)> {
        loop {
            let calls = self.tool_calls();
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn send_event(&self, sse: Sse) {
        if let Some(stream) = &self.state().stream {
            let _ = stream.unbounded_send(Ok(sse));
        }
    }

    pub fn send_raw(&self, data: &str) {
        self.send_event(Sse {
            event: Some("message".into()),
            data: Some(data.to_owned()),
            id: None,
            retry: None,
        });
    }

    pub fn send(&self, message: Value) {
        self.send_raw(&message.to_string());
    }

    pub fn send_progress(&self, id: RequestId, message: &str, progress: f64) {
        self.send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/progress",
            "params": {"requestId": id, "message": message, "progress": progress}
        }));
    }

    pub fn send_text_result(&self, id: RequestId, text: &str) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"content": [{"type": "text", "text": text}]}
        }));
    }

    pub fn send_result(&self, id: RequestId, result: Value) {
        self.send_text_result(id, &result.to_string());
    }

    /// End the current event stream as if the connection dropped.
    pub fn close_stream(&self) {
        self.state().stream.take();
    }
}

fn client_error(message: &str) -> StreamableHttpError<io::Error> {
    StreamableHttpError::Client(io::Error::other(message.to_owned()))
}

impl StreamableHttpClient for ScriptedHttpClient {
    type Error = io::Error;

    async fn post_message(
        &self,
        _uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        _custom_headers: CustomHeaders,
    ) -> Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>> {
        let responder = {
            let mut state = self.state();
            state.posts.push(RecordedPost {
                message: message.clone(),
                session_id: session_id.as_deref().map(str::to_owned),
            });
            if message.is_initialize() {
                if state.failing_handshakes > 0 {
                    state.failing_handshakes -= 1;
                    return Err(client_error("connection refused"));
                }
                return Ok(StreamableHttpPostResponse {
                    session_id: state.handshake_header.clone(),
                    body: state.handshake_body.clone(),
                });
            }
            if state.reject_tool_calls {
                return Err(client_error("tool call rejected"));
            }
            state.responder.clone()
        };
        if let (Some(responder), ClientRequest::CallToolRequest(request)) =
            (responder, &message.request)
        {
            responder(self, message.id, &request.params);
        }
        Ok(StreamableHttpPostResponse::accepted())
    }

    async fn get_stream(
        &self,
        _uri: Arc<str>,
        session_id: Option<Arc<str>>,
        last_event_id: Option<String>,
        _custom_headers: CustomHeaders,
    ) -> Result<BoxedSseResponse, StreamableHttpError<Self::Error>> {
        let mut state = self.state();
        state.stream_requests.push(RecordedStreamRequest {
            session_id: session_id.as_deref().map(str::to_owned),
            last_event_id,
        });
        if state.refuse_streams {
            return Err(client_error("stream refused"));
        }
        let (tx, rx) = mpsc::unbounded();
        state.stream = Some(tx);
        Ok(rx.boxed())
    }
}
