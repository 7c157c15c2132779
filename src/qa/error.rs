#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("QA loop for '{0}' exceeded the iteration cap")]
    IterationCapExceeded(String),

    #[error("agent CLI error: {0}")]
    Agent(#[from] crate::subprocess::ProcessError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize {entity}: {source}")]
    Serde {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}
