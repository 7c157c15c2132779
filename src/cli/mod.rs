//! Command-line entry point: argument parsing and routing only. All engine
//! logic lives in the `app`, `session`, `spec`, `qa`, and `worktree` modules.

pub mod args;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;
