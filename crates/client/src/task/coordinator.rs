use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use super::{TaskId, TaskSink};
use crate::response::{Payload, ResponseHead};
use folio_core::Error;

pub(super) enum Command {
    Register { id: TaskId, sink: Arc<dyn TaskSink> },
    Attach { id: TaskId, worker: AbortHandle },
    Respond { id: TaskId, head: ResponseHead },
    Data { id: TaskId, data: Bytes },
    Finish { id: TaskId },
    Fail { id: TaskId, error: Error },
    Deliver { id: TaskId, outcome: Result<Option<Payload>, Error> },
    Cancel { id: TaskId },
    IsActive { id: TaskId, reply: oneshot::Sender<bool> },
    ActiveCount { reply: oneshot::Sender<usize> },
}

struct ActiveTask {
    sink: Arc<dyn TaskSink>,
    worker: Option<AbortHandle>,
    responded: bool,
}

pub(super) struct Coordinator {
    rx: mpsc::UnboundedReceiver<Command>,
    active: HashMap<TaskId, ActiveTask>,
}

impl Coordinator {
    pub(super) fn new(rx: mpsc::UnboundedReceiver<Command>) -> Self {
        Self { rx, active: HashMap::new() }
    }

    pub(super) async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            self.apply(command);
        }
        for (id, task) in self.active.drain() {
            tracing::debug!("{} still active at shutdown", id);
            if let Some(worker) = task.worker {
                worker.abort();
            }
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register { id, sink } => {
                self.active
                    .entry(id)
                    .or_insert(ActiveTask { sink, worker: None, responded: false });
            }
            Command::Attach { id, worker } => match self.active.get_mut(&id) {
                Some(task) => task.worker = Some(worker),
                None => worker.abort(),
            },
            Command::Respond { id, head } => {
                if let Some(task) = self.active.get_mut(&id) {
                    task.responded = true;
                    task.sink.did_receive_response(id, &head);
                }
            }
            Command::Data { id, data } => match self.active.get(&id) {
                Some(task) if task.responded => task.sink.did_receive_data(id, &data),
                Some(_) => tracing::warn!("{} sent data before a response; dropping {} bytes", id, data.len()),
                None => {}
            },
            Command::Finish { id } => {
                if let Some(task) = self.active.remove(&id) {
                    task.sink.did_finish(id);
                }
            }
            Command::Fail { id, error } => {
                if let Some(task) = self.active.remove(&id) {
                    tracing::debug!("{} failed: {}", id, error);
                    task.sink.did_fail(id, &error);
                }
            }
            Command::Deliver { id, outcome } => {
                let Some(task) = self.active.remove(&id) else {
                    return;
                };
                match outcome {
                    Ok(Some(payload)) => {
                        task.sink.did_receive_response(id, &payload.head);
                        if let Some(body) = payload.body {
                            task.sink.did_receive_data(id, &body);
                        }
                        task.sink.did_finish(id);
                    }
                    Ok(None) => {
                        let error = Error::UnexpectedResponse("no response was produced".into());
                        task.sink.did_fail(id, &error);
                    }
                    Err(error) => {
                        tracing::debug!("{} failed: {}", id, error);
                        task.sink.did_fail(id, &error);
                    }
                }
            }
            Command::Cancel { id } => {
                if let Some(task) = self.active.remove(&id) {
                    tracing::debug!("{} cancelled", id);
                    if let Some(worker) = task.worker {
                        worker.abort();
                    }
                }
            }
            Command::IsActive { id, reply } => {
                let _ = reply.send(self.active.contains_key(&id));
            }
            Command::ActiveCount { reply } => {
                let _ = reply.send(self.active.len());
            }
        }
    }
}
