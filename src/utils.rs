pub mod context;
pub mod file;
pub mod process;
pub mod thread;
