#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("phase '{phase}' failed after {attempts} attempt(s): {source}")]
    PhaseFailed {
        phase: String,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },

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

    #[error("spec document is malformed: {0}")]
    MalformedSpec(String),
}
