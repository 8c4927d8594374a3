use serde::{Deserialize, Serialize};

/// Progress events streamed to whoever provided the task channel.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TaskStatus {
    /// Overall progress in percent, with a short status line.
    Progress { value: f32, message: String },
    /// A download task changed state.
    Item {
        index: usize,
        total: usize,
        id: String,
        state: String,
    },
    Finished,
}
