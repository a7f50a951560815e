//! Lifecycle of intercepted tasks.
//!
//! A single coordinator task owns the set of active tasks and is the only
//! code that calls into a [`TaskSink`]. Workers report progress by sending
//! commands over an unbounded channel, so they never block and the events of
//! one task are applied in the order they were sent.
//!
//! Per task: `pending -> (responded)* -> finished | failed | cancelled`.
//! A terminal event or a cancellation removes the task from the active set;
//! anything that arrives for a task that is no longer active is dropped.

mod coordinator;

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use url::Url;

use crate::response::{Payload, ResponseHead};
use coordinator::{Command, Coordinator};
use folio_core::Error;

/// Opaque task identity supplied by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The renderer's view of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRequest {
    pub url: Url,
    pub method: String,
    pub headers: Vec<(String, String)>,
}

impl SchemeRequest {
    pub fn get(url: Url) -> Self {
        Self { url, method: "GET".into(), headers: Vec::new() }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Callbacks into the renderer.
///
/// Called only from the coordinator task; implementations must not block.
pub trait TaskSink: Send + Sync {
    fn did_receive_response(&self, id: TaskId, head: &ResponseHead);

    fn did_receive_data(&self, id: TaskId, data: &Bytes);

    fn did_finish(&self, id: TaskId);

    fn did_fail(&self, id: TaskId, error: &Error);
}

/// One outstanding request from the renderer.
#[derive(Clone)]
pub struct InterceptedTask {
    pub id: TaskId,
    pub request: SchemeRequest,
    pub sink: Arc<dyn TaskSink>,
}

impl fmt::Debug for InterceptedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptedTask")
            .field("id", &self.id)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Handle to the coordinator. Cheap to clone.
///
/// The coordinator runs until every handle has been dropped.
#[derive(Clone, Debug)]
pub struct TaskManager {
    tx: mpsc::UnboundedSender<Command>,
}

impl TaskManager {
    /// Spawn the coordinator on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Coordinator::new(rx).run());
        Self { tx }
    }

    /// Add a task to the active set. Registering an active id again is a
    /// no-op.
    pub fn register(&self, id: TaskId, sink: Arc<dyn TaskSink>) {
        self.send(Command::Register { id, sink });
    }

    /// Bind the worker serving `id`, so cancellation can abort it. A worker
    /// attached to a task that is no longer active is aborted immediately.
    pub fn attach(&self, id: TaskId, worker: AbortHandle) {
        self.send(Command::Attach { id, worker });
    }

    /// Whether `id` is still active.
    pub async fn is_active(&self, id: TaskId) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsActive { id, reply });
        rx.await.unwrap_or(false)
    }

    /// Number of active tasks.
    pub async fn active_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ActiveCount { reply });
        rx.await.unwrap_or(0)
    }

    /// Deliver a complete outcome and remove the task.
    ///
    /// - `Err` fails the task.
    /// - `Ok(Some(payload))` delivers the head, the body if any, then finish.
    /// - `Ok(None)` fails the task with [`Error::UnexpectedResponse`].
    pub fn deliver(&self, id: TaskId, outcome: Result<Option<Payload>, Error>) {
        self.send(Command::Deliver { id, outcome });
    }

    /// Deliver response metadata for a streaming task.
    pub fn respond(&self, id: TaskId, head: ResponseHead) {
        self.send(Command::Respond { id, head });
    }

    /// Deliver one body chunk for a streaming task.
    pub fn send_data(&self, id: TaskId, data: Bytes) {
        self.send(Command::Data { id, data });
    }

    /// Finish a streaming task.
    pub fn finish(&self, id: TaskId) {
        self.send(Command::Finish { id });
    }

    /// Fail a task.
    pub fn fail(&self, id: TaskId, error: Error) {
        self.send(Command::Fail { id, error });
    }

    /// Remove a task without delivering anything further and abort its
    /// worker.
    pub fn cancel(&self, id: TaskId) {
        self.send(Command::Cancel { id });
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("task coordinator has stopped; dropping command");
        }
    }
}
