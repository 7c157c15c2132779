//! LLM Client Factory: hands agent-backed phases a handle to whatever does
//! the actual code generation. The core treats this as opaque — it only
//! needs something that runs a subcommand and returns text, which is exactly
//! [`AgentCliRunner`]'s shape, so the "factory" here is a thin constructor
//! rather than a distinct abstraction.

use std::sync::Arc;

use crate::subprocess::{AgentCliRunner, SubprocessManager};

pub trait LlmClientFactory: Send + Sync {
    fn client(&self) -> Arc<dyn AgentCliRunner>;
}

pub struct SubprocessLlmClientFactory {
    subprocess: SubprocessManager,
}

impl SubprocessLlmClientFactory {
    pub fn new(subprocess: SubprocessManager) -> Self {
        Self { subprocess }
    }
}

impl LlmClientFactory for SubprocessLlmClientFactory {
    fn client(&self) -> Arc<dyn AgentCliRunner> {
        Arc::new(self.subprocess.agent())
    }
}
