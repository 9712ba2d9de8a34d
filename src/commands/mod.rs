pub mod app_command;
pub mod task;

pub use app_command::{AppCommand, BulkKind, HELP_TEXT};
pub use task::BackgroundTask;
