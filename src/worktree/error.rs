use crate::subprocess::ProcessError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("namespace conflict: a worktree already exists for spec '{0}'")]
    NamespaceConflict(String),

    #[error("no session named '{0}' is tracked")]
    SessionNotFound(String),

    #[error("worktree path {0} already exists and is not empty")]
    PathOccupied(PathBuf),

    #[error("could not determine a base branch (tried configured, main, master)")]
    NoBaseBranch,

    #[error("merge of '{session}' into '{target}' produced conflicts: {detail}")]
    MergeConflict {
        session: String,
        target: String,
        detail: String,
    },

    #[error("session '{0}' has no commits to merge")]
    NothingToMerge(String),

    #[error("git operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ProcessError,
    },

    #[error("worktree operation for '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize worktree state for '{name}': {source}")]
    State {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
