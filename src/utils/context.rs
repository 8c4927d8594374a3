use crate::models::error::SError;
use crate::models::task_status::TaskStatus;
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::spawn_blocking;
use tokio::task_local;

pub type StatusSender = UnboundedSender<TaskStatus>;

task_local! {
     static CHANNEL: StatusSender;
}

pub struct TaskContext;

impl TaskContext {
    /// Runs blocking work on the blocking pool with `channel` as its status sink.
    pub async fn provide<F, R>(channel: StatusSender, f: F) -> Result<R, SError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        spawn_blocking(move || CHANNEL.sync_scope(channel, f))
            .await
            .map_err(|e| SError::AsyncRuntimeError(e.to_string()))
    }

    /// Runs a future with `channel` as its status sink.
    pub async fn scope<F>(channel: StatusSender, fut: F) -> F::Output
    where
        F: Future,
    {
        CHANNEL.scope(channel, fut).await
    }

    pub fn emit(status: TaskStatus) -> Result<(), SError> {
        CHANNEL
            .try_with(|c| {
                c.send(status)
                    .map_err(|e| SError::AsyncRuntimeError(e.to_string()))
            })
            .unwrap_or(Err(SError::ContextUnprovided))
    }

    /// Like `emit`, for callers that treat progress as best-effort.
    pub fn report(status: TaskStatus) {
        if let Err(e) = Self::emit(status) {
            tracing::trace!("status dropped: {e}");
        }
    }
}
