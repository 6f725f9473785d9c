use std::sync::Arc;

use futures::StreamExt;
use http::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use sse_stream::SseStream;

use crate::{
    model::ClientJsonRpcMessage,
    transport::{
        common::{
            http_header::{
                ACCEPT_JSON_AND_EVENT_STREAM, EVENT_STREAM_MIME_TYPE, HEADER_LAST_EVENT_ID,
                HEADER_SESSION_ID, JSON_MIME_TYPE, QUERY_SESSION_ID,
            },
            sse::BoxedSseResponse,
        },
        streamable_http_client::{
            CustomHeaders, StreamableHttpClient, StreamableHttpError, StreamableHttpPostResponse,
        },
    },
};

impl From<reqwest::Error> for StreamableHttpError<reqwest::Error> {
    fn from(e: reqwest::Error) -> Self {
        StreamableHttpError::Client(e)
    }
}

fn apply_custom_headers(
    mut request: reqwest::RequestBuilder,
    custom_headers: CustomHeaders,
) -> reqwest::RequestBuilder {
    for (name, value) in custom_headers {
        request = request.header(name, value);
    }
    request
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(str::to_owned)
}

impl StreamableHttpClient for reqwest::Client {
    type Error = reqwest::Error;

    async fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        custom_headers: CustomHeaders,
    ) -> Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>> {
        let accept = if message.is_initialize() {
            JSON_MIME_TYPE
        } else {
            ACCEPT_JSON_AND_EVENT_STREAM
        };
        let mut request = self
            .post(uri.as_ref())
            .header(ACCEPT, accept)
            .header(CONTENT_TYPE, JSON_MIME_TYPE)
            .json(&message);
        if let Some(session_id) = session_id {
            request = request.header(HEADER_SESSION_ID, session_id.as_ref());
        }
        let response = apply_custom_headers(request, custom_headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamableHttpError::UnexpectedServerResponse(
                format!("post message rejected with status {status}").into(),
            ));
        }
        let session_id = response
            .headers()
            .get(HEADER_SESSION_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        // the body is an acknowledgement at most, an unreadable one is not an error
        let body = match content_type(&response) {
            Some(ct) if ct.starts_with(EVENT_STREAM_MIME_TYPE) => None,
            _ => response
                .bytes()
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok()),
        };
        Ok(StreamableHttpPostResponse { session_id, body })
    }

    async fn get_stream(
        &self,
        uri: Arc<str>,
        session_id: Option<Arc<str>>,
        last_event_id: Option<String>,
        custom_headers: CustomHeaders,
    ) -> Result<BoxedSseResponse, StreamableHttpError<Self::Error>> {
        let mut url = url::Url::parse(&uri)?;
        if let Some(session_id) = &session_id {
            url.query_pairs_mut()
                .append_pair(QUERY_SESSION_ID, session_id);
        }
        let mut request = self.get(url).header(ACCEPT, EVENT_STREAM_MIME_TYPE);
        if let Some(session_id) = session_id {
            request = request.header(HEADER_SESSION_ID, session_id.as_ref());
        }
        if let Some(last_event_id) = last_event_id {
            request = request.header(HEADER_LAST_EVENT_ID, last_event_id);
        }
        let response = apply_custom_headers(request, custom_headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamableHttpError::UnexpectedServerResponse(
                format!("event stream rejected with status {status}").into(),
            ));
        }
        match content_type(&response) {
            Some(ct) if ct.starts_with(EVENT_STREAM_MIME_TYPE) => {}
            other => return Err(StreamableHttpError::UnexpectedContentType(other)),
        }
        Ok(SseStream::from_bytes_stream(response.bytes_stream()).boxed())
    }
}
