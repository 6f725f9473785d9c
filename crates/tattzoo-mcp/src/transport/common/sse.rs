use std::time::Duration;

use futures::stream::BoxStream;
use sse_stream::{Error as SseError, Sse};

pub type BoxedSseResponse = BoxStream<'static, Result<Sse, SseError>>;

/// How the event stream is re-opened after it errors or ends.
///
/// `max_times` bounds the consecutive reconnection attempts for one
/// disconnection; `Some(0)` disables reconnection, `None` retries forever.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SseRetryConfig {
    pub max_times: Option<usize>,
    pub min_duration: Duration,
}

impl SseRetryConfig {
    pub const DEFAULT_MIN_DURATION: Duration = Duration::from_millis(1000);
    pub const DEFAULT_MAX_TIMES: usize = 3;
    /// Floor for a server-provided `retry` hint.
    pub const MIN_SERVER_RETRY: Duration = Duration::from_millis(100);

    pub const fn disabled() -> Self {
        Self {
            max_times: Some(0),
            min_duration: Self::DEFAULT_MIN_DURATION,
        }
    }
}

impl Default for SseRetryConfig {
    fn default() -> Self {
        Self {
            max_times: Some(Self::DEFAULT_MAX_TIMES),
            min_duration: Self::DEFAULT_MIN_DURATION,
        }
    }
}
