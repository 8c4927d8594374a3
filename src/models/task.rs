use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Fatal conditions recognised in downloader output.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum FatalKind {
    #[display("insufficient disk space")]
    DiskSpace,
    #[display("item rejected by downloader")]
    ItemRejected,
    #[display("login failure")]
    LoginFailure,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display)]
pub enum FailureReason {
    /// A fatal pattern matched; `line` is the output that matched.
    #[display("{kind}: {line}")]
    Fatal { kind: FatalKind, line: String },
    #[display("no verified output after {}s", waited.as_secs())]
    Timeout { waited: Duration },
    #[display("downloader stalled for {}s", idle.as_secs())]
    Stalled { idle: Duration },
    #[display("failed to launch downloader: {_0}")]
    Launch(String),
    #[display("downloader exited with {_0} without reporting success")]
    Exit(String),
    #[display("not a workshop item id: '{_0}'")]
    InvalidId(String),
    #[display("failed to place content: {_0}")]
    Placement(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Resolving,
    Downloading,
    Verifying,
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl TaskState {
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Resolving => "resolving",
            TaskState::Downloading => "downloading",
            TaskState::Verifying => "verifying",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed(_) => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DownloadTask {
    pub id: String,
    pub display_name: Option<String>,
    pub state: TaskState,
    pub bytes_seen: u64,
    pub total_bytes: Option<u64>,
    pub started_at: Option<SystemTime>,
    pub exit_code: Option<i32>,
}

impl DownloadTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            state: TaskState::Queued,
            bytes_seen: 0,
            total_bytes: None,
            started_at: None,
            exit_code: None,
        }
    }

    /// Best label for naming placed files and for logs.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BatchJob {
    pub tasks: Vec<DownloadTask>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchJob {
    pub fn new(ids: &[String]) -> Self {
        Self {
            tasks: ids.iter().map(DownloadTask::new).collect(),
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn cancelled(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Cancelled)
            .count()
    }

    /// Records a task's terminal state into the counters.
    pub fn record(&mut self, index: usize) {
        match self.tasks[index].state {
            TaskState::Succeeded => self.succeeded += 1,
            TaskState::Failed(_) => self.failed += 1,
            _ => {}
        }
    }
}
