//! The spec pipeline: a fixed Discovery→(Requirements)→Complexity prefix,
//! followed by a complexity-tier-driven (or explicitly overridden) sequence
//! of remaining phases, each cached to disk and retried on failure with a
//! fixed delay — deliberately not the worktree manager's exponential
//! backoff, since pipeline-phase failures are usually the agent producing
//! bad output, not a transient network blip.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::spec::complexity::{self, ComplexityAssessment, ComplexityTier};
use crate::spec::error::PipelineError;

const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Bugfix,
    Refactor,
    Migration,
    Integration,
    Investigation,
    Documentation,
    Feature,
}

/// Ordered keyword-family checks — first match wins, `Feature` is the
/// fallback. Order matters: a description mentioning both "fix" and
/// "refactor" classifies as a bugfix, not a refactor.
pub fn infer_workflow_type(task_description: &str) -> WorkflowType {
    let lower = task_description.to_lowercase();
    let families: &[(&[&str], WorkflowType)] = &[
        (&["bug", "fix", "broken", "crash", "regression"], WorkflowType::Bugfix),
        (&["refactor", "clean up", "reorganize", "simplify"], WorkflowType::Refactor),
        (&["migrate", "migration", "upgrade", "port to"], WorkflowType::Migration),
        (&["integrate", "integration", "connect to", "wire up"], WorkflowType::Integration),
        (&["investigate", "why does", "root cause", "diagnose"], WorkflowType::Investigation),
        (&["document", "documentation", "readme", "changelog"], WorkflowType::Documentation),
    ];

    for (keywords, workflow) in families {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *workflow;
        }
    }
    WorkflowType::Feature
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseArtifact {
    pub phase: String,
    pub content: serde_json::Value,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait Phase: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, ctx: &PipelineContext) -> Result<serde_json::Value, PipelineError>;
}

pub struct PipelineContext {
    pub spec_slug: String,
    pub task_description: String,
    pub interactive: bool,
    pub artifacts_dir: PathBuf,
    pub recommended_phases: Option<Vec<String>>,
}

pub struct Pipeline {
    phases: HashMap<String, Box<dyn Phase>>,
    max_retries: u32,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            phases: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn register(mut self, phase: Box<dyn Phase>) -> Self {
        self.phases.insert(phase.name().to_string(), phase);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn artifact_path(ctx: &PipelineContext, phase: &str) -> PathBuf {
        ctx.artifacts_dir.join(format!("{phase}.json"))
    }

    /// Writes the artifact to `<phase>.json.tmp` then renames over the final
    /// path, then reloads it from disk — so a resumed run and a fresh run
    /// read identical bytes, never an in-memory value that silently drifted
    /// from what's on disk.
    async fn cache_and_reload(
        &self,
        ctx: &PipelineContext,
        phase: &str,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, PipelineError> {
        tokio::fs::create_dir_all(&ctx.artifacts_dir).await?;
        let artifact = PhaseArtifact {
            phase: phase.to_string(),
            content: value,
            completed_at: chrono::Utc::now(),
        };

        let final_path = Self::artifact_path(ctx, phase);
        let tmp_path = final_path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&artifact).map_err(|source| PipelineError::Serde {
            entity: phase.to_string(),
            source,
        })?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        let raw = tokio::fs::read_to_string(&final_path).await?;
        let reloaded: PhaseArtifact =
            serde_json::from_str(&raw).map_err(|source| PipelineError::Serde {
                entity: phase.to_string(),
                source,
            })?;
        Ok(reloaded.content)
    }

    async fn load_cached(&self, ctx: &PipelineContext, phase: &str) -> Option<serde_json::Value> {
        let path = Self::artifact_path(ctx, phase);
        let raw = tokio::fs::read_to_string(path).await.ok()?;
        let artifact: PhaseArtifact = serde_json::from_str(&raw).ok()?;
        Some(artifact.content)
    }

    async fn run_phase_with_retry(
        &self,
        ctx: &PipelineContext,
        name: &str,
    ) -> Result<serde_json::Value, PipelineError> {
        if let Some(cached) = self.load_cached(ctx, name).await {
            debug!("phase '{}' served from cache", name);
            return Ok(cached);
        }

        let phase = self
            .phases
            .get(name)
            .ok_or_else(|| PipelineError::UnknownPhase(name.to_string()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match phase.run(ctx).await {
                Ok(value) => return self.cache_and_reload(ctx, name, value).await,
                Err(e) if attempt <= self.max_retries => {
                    warn!("phase '{}' failed on attempt {}: {}, retrying in {:?}", name, attempt, e, RETRY_DELAY);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(PipelineError::PhaseFailed {
                        phase: name.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Chooses the phase order: Discovery, then Requirements if interactive,
    /// then Complexity always — followed by whatever the complexity tier (or
    /// an explicit override) says comes next.
    fn phase_order(ctx: &PipelineContext, tier: ComplexityTier) -> Vec<String> {
        let mut order = vec!["discovery".to_string()];
        if ctx.interactive {
            order.push("requirements".to_string());
        }
        order.push("complexity".to_string());

        if let Some(explicit) = &ctx.recommended_phases {
            order.extend(explicit.iter().cloned());
            return order;
        }

        let rest: &[&str] = match tier {
            ComplexityTier::Simple => &["context", "write", "validate"],
            ComplexityTier::Standard => &["context", "impact", "write", "validate"],
            ComplexityTier::Complex => &["context", "impact", "write", "validate", "review"],
            ComplexityTier::Critical => {
                &["context", "impact", "write", "validate", "review", "escalate"]
            }
        };
        order.extend(rest.iter().map(|s| s.to_string()));
        order
    }

    pub async fn run(
        &self,
        ctx: &PipelineContext,
        known_services: &[String],
    ) -> Result<Vec<(String, serde_json::Value)>, PipelineError> {
        let assessment = complexity::assess(&ctx.task_description, known_services);
        let order = Self::phase_order(ctx, assessment.tier);

        let mut results = Vec::new();
        for name in order {
            let value = if name == "complexity" {
                serde_json::to_value(&assessment).map_err(|source| PipelineError::Serde {
                    entity: name.clone(),
                    source,
                })?
            } else {
                self.run_phase_with_retry(ctx, &name).await?
            };
            info!("phase '{}' complete for spec '{}'", name, ctx.spec_slug);
            results.push((name, value));
        }

        Ok(results)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

pub fn assessment_for(task_description: &str, known_services: &[String]) -> ComplexityAssessment {
    complexity::assess(task_description, known_services)
}

pub fn spec_artifacts_dir(root: &Path, spec_slug: &str) -> PathBuf {
    spec_artifacts_dir_under(root, ".state", spec_slug)
}

/// Same as [`spec_artifacts_dir`] but with the state-root directory name
/// taken from configuration instead of the `.state` default.
pub fn spec_artifacts_dir_under(root: &Path, state_root: &str, spec_slug: &str) -> PathBuf {
    root.join(state_root).join("specs").join(spec_slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bugfix_before_refactor() {
        let wf = infer_workflow_type("Fix the bug and also refactor the surrounding code");
        assert_eq!(wf, WorkflowType::Bugfix);
    }

    #[test]
    fn classifies_documentation() {
        let wf = infer_workflow_type("Update the README with new usage examples");
        assert_eq!(wf, WorkflowType::Documentation);
    }

    #[test]
    fn falls_back_to_feature() {
        let wf = infer_workflow_type("Add a dark mode toggle to settings");
        assert_eq!(wf, WorkflowType::Feature);
    }

    #[test]
    fn phase_order_includes_requirements_only_when_interactive() {
        let ctx = PipelineContext {
            spec_slug: "demo".into(),
            task_description: "Add a dark mode toggle".into(),
            interactive: true,
            artifacts_dir: PathBuf::from("/tmp/demo"),
            recommended_phases: None,
        };
        let order = Pipeline::phase_order(&ctx, ComplexityTier::Standard);
        assert!(order.contains(&"requirements".to_string()));
        assert_eq!(order[0], "discovery");
    }

    #[test]
    fn explicit_recommended_phases_override_tier_defaults() {
        let ctx = PipelineContext {
            spec_slug: "demo".into(),
            task_description: "Add a dark mode toggle".into(),
            interactive: false,
            artifacts_dir: PathBuf::from("/tmp/demo"),
            recommended_phases: Some(vec!["write".to_string()]),
        };
        let order = Pipeline::phase_order(&ctx, ComplexityTier::Critical);
        assert_eq!(order, vec!["discovery", "complexity", "write"]);
    }
}
