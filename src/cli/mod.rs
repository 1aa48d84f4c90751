//! Line-driven shell that renders a wizard flow as text and persists
//! submissions to JSON files.

pub mod core;
pub mod output;
pub mod persist;
mod shell;

pub use self::core::{CliError, CliMode, CliOptions, ShellContext};
pub use persist::JsonFileSubmission;
pub use shell::{run_cli, SCRIPT_ENV};
