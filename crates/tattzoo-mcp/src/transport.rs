//! Transport primitives for the two-channel protocol.
//!
//! Outbound requests travel as HTTP POSTs whose responses are only an
//! acknowledgement. Everything the server has to say about a request arrives
//! later on a long-lived server-sent event stream opened against the same
//! endpoint. [`StreamableHttpClient`] abstracts both channels so the client
//! can run over [`reqwest`] or any other HTTP stack.
//!
//! [`reqwest`]: https://docs.rs/reqwest
use std::borrow::Cow;

pub mod common;
pub mod streamable_http_client;

pub use common::sse::{BoxedSseResponse, SseRetryConfig};
pub use streamable_http_client::{
    EventStreamWorker, StreamableHttpClient, StreamableHttpError, StreamableHttpPostResponse,
};

/// A transport error with its concrete type erased.
#[derive(Debug, thiserror::Error)]
#[error("Transport [{transport_name}] error: {error}")]
pub struct DynamicTransportError {
    pub transport_name: Cow<'static, str>,
    pub transport_type_id: std::any::TypeId,
    #[source]
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl DynamicTransportError {
    pub fn new<T: 'static, E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self {
            transport_name: std::any::type_name::<T>().into(),
            transport_type_id: std::any::TypeId::of::<T>(),
            error: Box::new(error),
        }
    }

    pub fn is<T: 'static, E: std::error::Error + 'static>(&self) -> bool {
        self.transport_type_id == std::any::TypeId::of::<T>() && self.error.is::<E>()
    }
}
