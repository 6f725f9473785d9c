//! The table of in-flight tool calls, keyed by request id.
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;
use tokio::sync::oneshot;

use super::ProgressHandler;
use crate::{
    error::ToolCallError,
    model::{CallToolResult, JsonRpcError, JsonRpcResponse, RequestId, ServerJsonRpcMessage},
};

pub(crate) type ToolCallOutcome = Result<Value, ToolCallError>;

struct PendingRequest {
    responder: oneshot::Sender<ToolCallOutcome>,
    progress: Option<ProgressHandler>,
}

#[derive(Default)]
struct PendingTable {
    requests: HashMap<RequestId, PendingRequest>,
    closed: bool,
}

/// Continuations are always invoked after the lock is released.
#[derive(Default)]
pub(crate) struct PendingRequests {
    table: Mutex<PendingTable>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(
        &self,
        id: RequestId,
        progress: Option<ProgressHandler>,
    ) -> Result<oneshot::Receiver<ToolCallOutcome>, ToolCallError> {
        let mut table = self.lock();
        if table.closed {
            return Err(ToolCallError::StreamClosed);
        }
        let (responder, receiver) = oneshot::channel();
        table
            .requests
            .insert(id, PendingRequest { responder, progress });
        Ok(receiver)
    }

    pub(crate) fn remove(&self, id: RequestId) -> bool {
        self.lock().requests.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().requests.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn route(&self, message: ServerJsonRpcMessage) {
        match message {
            ServerJsonRpcMessage::Progress(progress) => {
                let handler = self
                    .lock()
                    .requests
                    .get(&progress.request_id)
                    .and_then(|pending| pending.progress.clone());
                match handler {
                    Some(handler) => {
                        tracing::trace!(
                            request_id = progress.request_id,
                            progress = progress.progress,
                            "dispatch progress"
                        );
                        handler(&progress.message, progress.progress);
                    }
                    None => {
                        tracing::trace!(
                            request_id = progress.request_id,
                            "progress for unknown request"
                        );
                    }
                }
            }
            ServerJsonRpcMessage::Response(JsonRpcResponse { id, result }) => {
                let outcome = CallToolResult::decode_payload(result).ok_or_else(|| {
                    tracing::warn!(request_id = id, "tool result has no text content");
                    ToolCallError::InvalidResult
                });
                self.complete(id, outcome);
            }
            ServerJsonRpcMessage::Error(JsonRpcError { id, error }) => {
                self.complete(id, Err(ToolCallError::Remote(error)));
            }
        }
    }

    fn complete(&self, id: RequestId, outcome: ToolCallOutcome) {
        let pending = self.lock().requests.remove(&id);
        let Some(pending) = pending else {
            tracing::trace!(request_id = id, "result for unknown request");
            return;
        };
        if pending.responder.send(outcome).is_err() {
            tracing::trace!(request_id = id, "caller gone before result arrived");
        }
    }

    /// Reject everything in flight and refuse new registrations.
    pub(crate) fn close(&self) {
        let drained = {
            let mut table = self.lock();
            table.closed = true;
            table.requests.drain().collect::<Vec<_>>()
        };
        for (id, pending) in drained {
            tracing::debug!(request_id = id, "reject pending call, event stream closed");
            let _ = pending.responder.send(Err(ToolCallError::StreamClosed));
        }
    }
}

/// Removes its entry when the call future finishes or is dropped.
pub(crate) struct PendingGuard<'a> {
    pub(crate) requests: &'a PendingRequests,
    pub(crate) id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.requests.remove(self.id) {
            tracing::trace!(request_id = self.id, "pending call cleaned up");
        }
    }
}
