use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::model::DroppedMessage;

pub type DiagnosticHook = Arc<dyn Fn(&DroppedMessage) + Send + Sync>;

/// Observes event-stream payloads the client had to discard.
///
/// Dropping is never an error for callers; this is how operators notice a
/// misbehaving server.
#[derive(Clone, Default)]
pub struct Diagnostics {
    dropped: Arc<AtomicUsize>,
    hook: Option<DiagnosticHook>,
}

impl Diagnostics {
    pub fn with_hook(hook: impl Fn(&DroppedMessage) + Send + Sync + 'static) -> Self {
        Self {
            dropped: Default::default(),
            hook: Some(Arc::new(hook)),
        }
    }

    /// Number of messages dropped since the client was created.
    pub fn dropped_messages(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn record(&self, dropped: &DroppedMessage) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(reason = %dropped.reason, "drop malformed server message");
        if let Some(hook) = &self.hook {
            hook(dropped);
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("dropped", &self.dropped_messages())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
