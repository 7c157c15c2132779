#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' is in state '{1}', which does not allow this transition")]
    InvalidTransition(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize session '{id}': {source}")]
    Serde {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
