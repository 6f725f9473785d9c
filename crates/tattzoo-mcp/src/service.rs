use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::model::RequestId;

mod client;
mod correlation;
mod diagnostics;
pub use client::*;
pub use diagnostics::{DiagnosticHook, Diagnostics};

/// Invoked with `(message, progress)` for every progress notification that
/// reaches a pending call.
pub type ProgressHandler = Arc<dyn Fn(&str, f64) + Send + Sync>;

pub trait RequestIdProvider: Send + Sync + 'static {
    fn next_request_id(&self) -> RequestId;
}

/// Hands out strictly increasing ids starting at 1; ids are never reused.
#[derive(Debug)]
pub struct AtomicU64RequestIdProvider {
    id: AtomicU64,
}

impl Default for AtomicU64RequestIdProvider {
    fn default() -> Self {
        Self {
            id: AtomicU64::new(1),
        }
    }
}

impl RequestIdProvider for AtomicU64RequestIdProvider {
    fn next_request_id(&self) -> RequestId {
        self.id.fetch_add(1, Ordering::SeqCst)
    }
}
