use std::{fmt::Display, time::Duration};

pub use crate::model::ErrorData;
use crate::transport::DynamicTransportError;

impl Display for ErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.0, self.message)?;
        if let Some(data) = &self.data {
            write!(f, "({})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorData {}

/// Why a single tool call did not produce a result.
///
/// Every variant is scoped to the call that produced it; other calls in
/// flight on the same client are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("Transport error: {0}")]
    Transport(#[from] DynamicTransportError),
    #[error("Invalid MCP result")]
    InvalidResult,
    #[error("Tool call timeout after {0:?}")]
    Timeout(Duration),
    #[error("Tool call cancelled")]
    Cancelled,
    #[error("Event stream closed")]
    StreamClosed,
    #[error("Remote error: {0}")]
    Remote(ErrorData),
}

impl ToolCallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolCallError::Timeout(_))
    }
}
