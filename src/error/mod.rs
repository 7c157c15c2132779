//! Unified error types for the engine.
//!
//! Each subsystem owns a `thiserror`-derived enum carrying whatever structured
//! context it needs (spec slug, session id, phase name). [`EngineError`]
//! composes them for call sites that cross subsystem boundaries, and gives the
//! CLI binary a single place to compute a user-facing message and exit code.

pub mod codes;

use crate::qa::QaError;
use crate::session::SessionError;
use crate::spec::PipelineError;
use crate::subprocess::ProcessError;
use crate::worktree::WorktreeError;
pub use codes::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Qa(#[from] QaError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Subprocess(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize/deserialize {entity}: {source}")]
    Serde {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Worktree(_) => ErrorCode::Worktree,
            EngineError::Pipeline(_) => ErrorCode::Pipeline,
            EngineError::Qa(_) => ErrorCode::Qa,
            EngineError::Session(_) => ErrorCode::Session,
            EngineError::Subprocess(_) => ErrorCode::Subprocess,
            EngineError::Io(_) => ErrorCode::Io,
            EngineError::Serde { .. } => ErrorCode::Serde,
        }
    }

    /// Message suitable for direct display to an end user (no internal detail).
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Worktree(e) => format!("Worktree operation failed: {e}"),
            EngineError::Pipeline(e) => format!("Spec pipeline failed: {e}"),
            EngineError::Qa(e) => format!("QA loop failed: {e}"),
            EngineError::Session(e) => format!("Session operation failed: {e}"),
            _ => format!("{self}"),
        }
    }

    /// Message intended for `-v` diagnostics: includes the full source chain.
    pub fn developer_message(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(s) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&s.to_string());
            source = s.source();
        }
        out
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }
}
