use std::{borrow::Cow, sync::Arc, time::Duration};

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::{
    AtomicU64RequestIdProvider, Diagnostics, ProgressHandler, RequestIdProvider,
    correlation::{PendingGuard, PendingRequests},
};
use crate::{
    error::ToolCallError,
    model::{
        CallToolRequest, CallToolRequestParam, ClientJsonRpcMessage, ClientRequest,
        Implementation, InitializeRequest, InitializeRequestParam, JsonObject, ProtocolVersion,
    },
    transport::{
        BoxedSseResponse, DynamicTransportError, EventStreamWorker, SseRetryConfig,
        StreamableHttpClient, StreamableHttpError, streamable_http_client::CustomHeaders,
    },
};

/// It represents the error that may occur while establishing a session.
#[derive(Error, Debug)]
pub enum ClientInitializeError {
    #[error("Send message error {error}, when {context}")]
    TransportError {
        error: DynamicTransportError,
        context: Cow<'static, str>,
    },
}

impl ClientInitializeError {
    pub fn transport<C: StreamableHttpClient>(
        error: StreamableHttpError<C::Error>,
        context: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::TransportError {
            error: DynamicTransportError::new::<C, _>(error),
            context: context.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct McpClientConfig {
    pub uri: Arc<str>,
    pub client_info: Implementation,
    pub protocol_version: ProtocolVersion,
    /// How long a dispatched call waits for its result on the event stream.
    pub call_timeout: Duration,
    pub retry_config: SseRetryConfig,
    pub channel_buffer_capacity: usize,
    pub custom_headers: CustomHeaders,
    pub diagnostics: Diagnostics,
}

impl McpClientConfig {
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn with_uri(uri: impl Into<Arc<str>>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn client_info(mut self, client_info: Implementation) -> Self {
        self.client_info = client_info;
        self
    }

    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn retry_config(mut self, retry_config: SseRetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn custom_headers(mut self, custom_headers: CustomHeaders) -> Self {
        self.custom_headers = custom_headers;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:8000/mcp".into(),
            client_info: Implementation::default(),
            protocol_version: ProtocolVersion::LATEST,
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
            retry_config: SseRetryConfig::default(),
            channel_buffer_capacity: 16,
            custom_headers: CustomHeaders::new(),
            diagnostics: Diagnostics::default(),
        }
    }
}

/// A session with the orchestration server.
///
/// Requests go out as POSTs; their progress and results come back on one
/// shared event stream and are matched to callers by request id. The stream
/// listener runs on its own task and stops when the client is dropped.
pub struct McpClient<C: StreamableHttpClient> {
    client: C,
    config: McpClientConfig,
    session_id: Option<Arc<str>>,
    server_info: Option<Value>,
    id_provider: AtomicU64RequestIdProvider,
    pending: Arc<PendingRequests>,
    _drop_guard: DropGuard,
}

#[cfg(feature = "__reqwest")]
impl McpClient<reqwest::Client> {
    pub async fn connect(config: McpClientConfig) -> Result<Self, ClientInitializeError> {
        Self::initialize(reqwest::Client::default(), config).await
    }
}

impl<C: StreamableHttpClient> McpClient<C> {
    /// Perform the handshake and open the event stream.
    ///
    /// A missing session id is tolerated; the client then sends no session
    /// header and subscribes without the `sessionId` query parameter.
    pub async fn initialize(
        client: C,
        config: McpClientConfig,
    ) -> Result<Self, ClientInitializeError> {
        let id_provider = AtomicU64RequestIdProvider::default();
        let init_request = InitializeRequest::new(InitializeRequestParam {
            protocol_version: config.protocol_version.clone(),
            capabilities: JsonObject::new(),
            client_info: config.client_info.clone(),
        });
        let response = client
            .post_message(
                config.uri.clone(),
                ClientJsonRpcMessage::request(
                    ClientRequest::InitializeRequest(init_request),
                    id_provider.next_request_id(),
                ),
                None,
                config.custom_headers.clone(),
            )
            .await
            .map_err(|error| ClientInitializeError::transport::<C>(error, "send initialize request"))?;
        let session_id: Option<Arc<str>> = response.resolve_session_id().map(Arc::from);
        if session_id.is_none() {
            tracing::debug!("server did not assign a session id");
        }
        let server_info = response
            .body
            .and_then(|mut body| body.get_mut("result").map(Value::take));

        let worker = EventStreamWorker {
            client: client.clone(),
            uri: config.uri.clone(),
            session_id: session_id.clone(),
            retry_config: config.retry_config,
            custom_headers: config.custom_headers.clone(),
        };
        let sse_stream = worker
            .open(None)
            .await
            .map_err(|error| ClientInitializeError::transport::<C>(error, "open event stream"))?;
        tracing::debug!(session_id = ?session_id, "event stream opened");

        let pending = Arc::new(PendingRequests::default());
        let ct = CancellationToken::new();
        tokio::spawn(listen(
            worker,
            sse_stream,
            pending.clone(),
            config.diagnostics.clone(),
            config.channel_buffer_capacity,
            ct.child_token(),
        ));
        Ok(Self {
            client,
            config,
            session_id,
            server_info,
            id_provider,
            pending,
            _drop_guard: ct.drop_guard(),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The `result` of the handshake response, when the server sent one.
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    pub fn config(&self) -> &McpClientConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.config.diagnostics
    }

    /// Number of calls waiting for a result.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Whether the event stream is gone for good.
    pub fn is_closed(&self) -> bool {
        self.pending.is_closed()
    }

    pub async fn call_tool(
        &self,
        name: impl Into<Cow<'static, str>>,
        arguments: JsonObject,
        on_progress: Option<ProgressHandler>,
    ) -> Result<Value, ToolCallError> {
        self.call_tool_with_ct(name, arguments, on_progress, CancellationToken::new())
            .await
    }

    /// Like [`McpClient::call_tool`], but gives up as soon as `ct` is
    /// cancelled, with the same cleanup as a timeout.
    pub async fn call_tool_with_ct(
        &self,
        name: impl Into<Cow<'static, str>>,
        arguments: JsonObject,
        on_progress: Option<ProgressHandler>,
        ct: CancellationToken,
    ) -> Result<Value, ToolCallError> {
        let name = name.into();
        let id = self.id_provider.next_request_id();
        // registered before dispatch so an early progress event is never missed
        let receiver = self.pending.register(id, on_progress)?;
        let _guard = PendingGuard {
            requests: &self.pending,
            id,
        };
        let message = ClientJsonRpcMessage::request(
            ClientRequest::CallToolRequest(CallToolRequest::new(CallToolRequestParam {
                name: name.clone(),
                arguments: Some(arguments),
            })),
            id,
        );
        let call = async {
            let dispatched = self
                .client
                .post_message(
                    self.config.uri.clone(),
                    message,
                    self.session_id.clone(),
                    self.config.custom_headers.clone(),
                )
                .await;
            if let Err(error) = dispatched {
                tracing::warn!(request_id = id, tool = %name, "fail to dispatch tool call: {error}");
                return Err(ToolCallError::Transport(DynamicTransportError::new::<C, _>(
                    error,
                )));
            }
            tracing::trace!(request_id = id, tool = %name, "tool call accepted");
            let call_timeout = self.config.call_timeout;
            match tokio::time::timeout(call_timeout, receiver).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(ToolCallError::StreamClosed),
                Err(_) => {
                    tracing::warn!(request_id = id, tool = %name, "tool call timed out after {call_timeout:?}");
                    Err(ToolCallError::Timeout(call_timeout))
                }
            }
        };
        tokio::select! {
            outcome = call => outcome,
            _ = ct.cancelled() => {
                tracing::debug!(request_id = id, tool = %name, "tool call cancelled");
                Err(ToolCallError::Cancelled)
            }
        }
    }
}

async fn listen<C: StreamableHttpClient>(
    worker: EventStreamWorker<C>,
    sse_stream: BoxedSseResponse,
    pending: Arc<PendingRequests>,
    diagnostics: Diagnostics,
    channel_buffer_capacity: usize,
    ct: CancellationToken,
) {
    let (tx, mut rx) = tokio::sync::mpsc::channel(channel_buffer_capacity);
    let route = async {
        while let Some(inbound) = rx.recv().await {
            match inbound {
                Ok(message) => pending.route(message),
                Err(dropped) => diagnostics.record(&dropped),
            }
        }
    };
    let (result, ()) = tokio::join!(worker.run(sse_stream, tx, ct.clone()), route);
    match result {
        Ok(()) if ct.is_cancelled() => tracing::trace!("event stream listener cancelled"),
        Ok(()) => tracing::debug!("event stream listener finished"),
        Err(e) => tracing::warn!("event stream lost: {e}"),
    }
    pending.close();
}
