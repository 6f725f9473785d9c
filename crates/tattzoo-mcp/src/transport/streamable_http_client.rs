use std::{borrow::Cow, collections::HashMap, sync::Arc, time::Duration};

use futures::StreamExt;
use http::{HeaderName, HeaderValue};
use serde_json::Value;
pub use sse_stream::Error as SseError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::common::{
    http_header::MESSAGE_EVENT,
    sse::{BoxedSseResponse, SseRetryConfig},
};
use crate::model::{ClientJsonRpcMessage, DroppedMessage, ServerJsonRpcMessage};

#[derive(Error, Debug)]
pub enum StreamableHttpError<E: std::error::Error + Send + Sync + 'static> {
    #[error("SSE error: {0}")]
    Sse(#[from] SseError),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Client error: {0}")]
    Client(E),
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,
    #[error("unexpected server response: {0}")]
    UnexpectedServerResponse(Cow<'static, str>),
    #[error("Unexpected content type: {0:?}")]
    UnexpectedContentType(Option<String>),
    #[error("Url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("Deserialize error: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// Acknowledgement of an outbound POST.
///
/// The body is kept for the handshake, which may carry the session id in
/// `result.sessionId`. For tool calls it is never the tool result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamableHttpPostResponse {
    pub session_id: Option<String>,
    pub body: Option<Value>,
}

impl StreamableHttpPostResponse {
    pub fn accepted() -> Self {
        Self::default()
    }

    /// Session id from the `Mcp-Session-Id` header, falling back to
    /// `result.sessionId` in the body. Empty values count as absent.
    pub fn resolve_session_id(&self) -> Option<&str> {
        let from_header = self.session_id.as_deref().filter(|id| !id.is_empty());
        from_header.or_else(|| {
            self.body
                .as_ref()?
                .pointer("/result/sessionId")?
                .as_str()
                .filter(|id| !id.is_empty())
        })
    }
}

pub type CustomHeaders = HashMap<HeaderName, HeaderValue>;

pub trait StreamableHttpClient: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;
    fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        custom_headers: CustomHeaders,
    ) -> impl Future<Output = Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>>>
    + Send
    + '_;
    fn get_stream(
        &self,
        uri: Arc<str>,
        session_id: Option<Arc<str>>,
        last_event_id: Option<String>,
        custom_headers: CustomHeaders,
    ) -> impl Future<Output = Result<BoxedSseResponse, StreamableHttpError<Self::Error>>> + Send + '_;
}

/// One routed event-stream payload, or the reason it was dropped.
pub type InboundMessage = Result<ServerJsonRpcMessage, DroppedMessage>;

/// Drives the long-lived event-stream subscription.
///
/// Yields every `message` event, parsed into a [`ServerJsonRpcMessage`], to a
/// channel. When the stream errors or ends it is re-opened according to
/// [`SseRetryConfig`], resuming from the last seen event id.
#[derive(Debug, Clone)]
pub struct EventStreamWorker<C: StreamableHttpClient> {
    pub client: C,
    pub uri: Arc<str>,
    pub session_id: Option<Arc<str>>,
    pub retry_config: SseRetryConfig,
    pub custom_headers: CustomHeaders,
}

impl<C: StreamableHttpClient> EventStreamWorker<C> {
    pub async fn open(
        &self,
        last_event_id: Option<String>,
    ) -> Result<BoxedSseResponse, StreamableHttpError<C::Error>> {
        self.client
            .get_stream(
                self.uri.clone(),
                self.session_id.clone(),
                last_event_id,
                self.custom_headers.clone(),
            )
            .await
    }

    /// Consume `sse_stream` until cancelled, the receiver is dropped, or the
    /// stream is lost for good.
    pub async fn run(
        self,
        sse_stream: BoxedSseResponse,
        tx: tokio::sync::mpsc::Sender<InboundMessage>,
        ct: CancellationToken,
    ) -> Result<(), StreamableHttpError<C::Error>> {
        let mut sse_stream = sse_stream;
        let mut retry_interval = self.retry_config.min_duration;
        let mut last_event_id = None;
        loop {
            let event = tokio::select! {
                event = sse_stream.next() => {
                    event
                }
                _ = ct.cancelled() => {
                    tracing::debug!("cancelled");
                    return Ok(());
                }
            };
            let next_sse = match event {
                Some(Ok(next_sse)) => next_sse,
                Some(Err(e)) => {
                    tracing::warn!("sse stream error: {e}");
                    match self
                        .reconnect(e.into(), last_event_id.clone(), retry_interval, &ct)
                        .await?
                    {
                        Some(new_stream) => {
                            sse_stream = new_stream;
                            continue;
                        }
                        None => return Ok(()),
                    }
                }
                None => {
                    tracing::debug!("sse stream terminated");
                    match self
                        .reconnect(
                            StreamableHttpError::UnexpectedEndOfStream,
                            last_event_id.clone(),
                            retry_interval,
                            &ct,
                        )
                        .await?
                    {
                        Some(new_stream) => {
                            sse_stream = new_stream;
                            continue;
                        }
                        None => return Ok(()),
                    }
                }
            };
            // set the retry interval
            if let Some(server_retry_interval) = next_sse.retry {
                let server_retry_interval = Duration::from_millis(server_retry_interval)
                    .max(SseRetryConfig::MIN_SERVER_RETRY);
                retry_interval = retry_interval.min(server_retry_interval);
            }
            if let Some(id) = next_sse.id {
                last_event_id = Some(id);
            }
            let is_message = match next_sse.event.as_deref() {
                None | Some("") => true,
                Some(event) => event == MESSAGE_EVENT,
            };
            if !is_message {
                tracing::trace!(event = ?next_sse.event, "skip non-message event");
                continue;
            }
            let Some(data) = next_sse.data else {
                continue;
            };
            if tx.send(ServerJsonRpcMessage::parse(&data)).await.is_err() {
                tracing::trace!("event stream consumer dropped, exiting");
                return Ok(());
            }
        }
    }

    /// Returns `Ok(None)` when cancelled while waiting to reconnect.
    async fn reconnect(
        &self,
        cause: StreamableHttpError<C::Error>,
        last_event_id: Option<String>,
        retry_interval: Duration,
        ct: &CancellationToken,
    ) -> Result<Option<BoxedSseResponse>, StreamableHttpError<C::Error>> {
        let max_times = self.retry_config.max_times.unwrap_or(usize::MAX);
        let mut last_error = cause;
        let mut retry_times = 0;
        while retry_times < max_times {
            tracing::debug!("event stream lost: {last_error}, retrying in {retry_interval:?}");
            tokio::select! {
                _ = tokio::time::sleep(retry_interval) => {}
                _ = ct.cancelled() => {
                    return Ok(None);
                }
            }
            retry_times += 1;
            match self.open(last_event_id.clone()).await {
                Ok(new_stream) => {
                    tracing::debug!(retry_times, "event stream reopened");
                    return Ok(Some(new_stream));
                }
                Err(e) => {
                    tracing::warn!(retry_times, "fail to reopen event stream: {e}");
                    last_error = e;
                }
            }
        }
        tracing::error!("event stream error: {last_error}, max retry times reached");
        Err(last_error)
    }
}
