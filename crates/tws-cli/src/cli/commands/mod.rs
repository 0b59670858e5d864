//! CLI command handlers. Each command is in its own file.

mod config_path;
mod stream;

pub use config_path::run_config_path;
pub use stream::run_stream;

pub(crate) use stream::{apply_filter_overrides, format_message, report_exit};
