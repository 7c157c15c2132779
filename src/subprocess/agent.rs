//! Thin subprocess wrapper around whatever CLI binary the configured LLM
//! client factory resolves to. The engine never hardcodes a vendor name —
//! the binary is configurable (`AppConfig`/`EngineConfig`), defaulting to
//! whatever is on `PATH` for the collaborator under test.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::builder::ProcessCommandBuilder;
use super::error::ProcessError;
use super::runner::ProcessRunner;

#[async_trait]
pub trait AgentCliRunner: Send + Sync {
    async fn check_availability(&self) -> Result<bool, ProcessError>;
    async fn run_command(
        &self,
        cmd: &str,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<String, ProcessError>;
}

pub struct AgentCliRunnerImpl {
    runner: Arc<dyn ProcessRunner>,
    binary: String,
}

impl AgentCliRunnerImpl {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_binary(runner, "claude")
    }

    pub fn with_binary(runner: Arc<dyn ProcessRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl AgentCliRunner for AgentCliRunnerImpl {
    async fn check_availability(&self) -> Result<bool, ProcessError> {
        let result = self
            .runner
            .run(
                ProcessCommandBuilder::new(&self.binary)
                    .args(&["--version"])
                    .build(),
            )
            .await;

        match result {
            Ok(output) => Ok(output.status.success()),
            Err(ProcessError::CommandNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn run_command(
        &self,
        cmd: &str,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<String, ProcessError> {
        let mut builder = ProcessCommandBuilder::new(&self.binary).arg(cmd);

        for arg in args {
            builder = builder.arg(arg);
        }

        for (key, value) in env_vars {
            builder = builder.env(key, value);
        }

        let output = self.runner.run(builder.build()).await?;

        if !output.status.success() {
            return Err(ProcessError::ExitCode(output.status.code().unwrap_or(1)));
        }

        Ok(output.stdout)
    }
}
