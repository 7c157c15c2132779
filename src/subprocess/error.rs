use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("process timed out after {0:?}")]
    Timeout(Duration),

    #[error("process exited with code {0}")]
    ExitCode(i32),

    #[error("process terminated by signal {0}")]
    Signal(i32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("utf-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("mock expectation not met: {0}")]
    MockExpectationNotMet(String),

    #[error("command failed: {command}: {stderr}")]
    CommandFailed {
        command: String,
        status: crate::subprocess::runner::ExitStatus,
        stderr: String,
    },
}
