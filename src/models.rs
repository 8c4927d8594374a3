pub mod addon;
pub mod catalog;
pub mod error;
pub mod paths;
pub mod task;
pub mod task_status;
