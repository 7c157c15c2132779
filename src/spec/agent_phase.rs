//! Generic agent-backed phase: every pipeline phase that has to actually
//! produce or judge prose (requirements gathering, context summarization,
//! spec writing, validation, review, escalation) shells out to the
//! configured agent CLI with a phase-specific prompt and wraps whatever it
//! prints to stdout as the phase artifact. The engine never parses or
//! second-guesses the agent's output beyond making it valid JSON.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::spec::error::PipelineError;
use crate::spec::pipeline::{Phase, PipelineContext};
use crate::subprocess::AgentCliRunner;

pub struct AgentPhase {
    name: String,
    subcommand: String,
    runner: Arc<dyn AgentCliRunner>,
}

impl AgentPhase {
    pub fn new(name: impl Into<String>, subcommand: impl Into<String>, runner: Arc<dyn AgentCliRunner>) -> Self {
        Self {
            name: name.into(),
            subcommand: subcommand.into(),
            runner,
        }
    }
}

#[async_trait]
impl Phase for AgentPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<serde_json::Value, PipelineError> {
        let mut env = HashMap::new();
        env.insert("SPECFORGE_SPEC_SLUG".to_string(), ctx.spec_slug.clone());
        env.insert("SPECFORGE_TASK".to_string(), ctx.task_description.clone());

        let args = vec![ctx.task_description.clone()];
        let output = self.runner.run_command(&self.subcommand, &args, &env).await?;

        Ok(serde_json::json!({ "phase": self.name, "output": output }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::SubprocessManager;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn wraps_agent_stdout_as_json() {
        let (subprocess, mut mock) = SubprocessManager::mock();
        mock.expect_command("claude")
            .with_args(|args| args == ["write", "add a feature"])
            .returns_stdout("spec written")
            .finish();

        let phase = AgentPhase::new("write", "write", Arc::new(subprocess.agent()));
        let ctx = PipelineContext {
            spec_slug: "demo".into(),
            task_description: "add a feature".into(),
            interactive: false,
            artifacts_dir: PathBuf::from("/tmp/demo"),
            recommended_phases: None,
        };
        let value = phase.run(&ctx).await.unwrap();
        assert_eq!(value["output"], "spec written");
    }
}
