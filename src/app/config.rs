//! Layered application configuration: built-in defaults, overridden by a
//! project-level `.specforge/config.toml`, overridden in turn by
//! `SPECFORGE_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const CONFIG_RELATIVE_PATH: &str = ".specforge/config.toml";

/// Root configuration structure, assembled by [`AppConfig::load`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    #[serde(skip)]
    pub verbose: u8,
    #[serde(skip)]
    pub working_dir: PathBuf,
}

/// The engine knobs a project can override: where state lives, how
/// worktrees are named, QA loop limits, pipeline retry behavior, and
/// session expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory name (relative to the repo root) engine state is kept
    /// under — sessions, worktree metadata, spec artifacts.
    pub state_root: String,
    /// Prefix applied to every worktree branch name, e.g. `session/<slug>`.
    pub worktree_namespace: String,
    /// Overrides automatic base-branch detection when set.
    pub base_branch: Option<String>,
    pub qa: QaLimits,
    pub pipeline: PipelineLimits,
    /// Hours a session may sit without progress before it's force-failed
    /// as stale.
    pub max_age_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaLimits {
    pub max_iterations: u32,
    pub max_consecutive_errors: u32,
    pub recurring_threshold: u32,
    pub min_fix_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineLimits {
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_root: ".state".to_string(),
            worktree_namespace: "session".to_string(),
            base_branch: None,
            qa: QaLimits::default(),
            pipeline: PipelineLimits::default(),
            max_age_hours: 24,
        }
    }
}

impl Default for QaLimits {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_consecutive_errors: 3,
            recurring_threshold: 3,
            min_fix_confidence: 0.7,
        }
    }
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// Partial, all-optional mirror of [`EngineConfig`] used to parse a project's
/// `config.toml` — any field left out of the file keeps the built-in default
/// rather than being overwritten with `None`/zero.
#[derive(Debug, Default, Deserialize)]
struct PartialEngineConfig {
    state_root: Option<String>,
    worktree_namespace: Option<String>,
    base_branch: Option<String>,
    qa: Option<PartialQaLimits>,
    pipeline: Option<PartialPipelineLimits>,
    max_age_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialQaLimits {
    max_iterations: Option<u32>,
    max_consecutive_errors: Option<u32>,
    recurring_threshold: Option<u32>,
    min_fix_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPipelineLimits {
    max_retries: Option<u32>,
}

fn merge_partial(mut base: EngineConfig, partial: PartialEngineConfig) -> EngineConfig {
    if let Some(v) = partial.state_root {
        base.state_root = v;
    }
    if let Some(v) = partial.worktree_namespace {
        base.worktree_namespace = v;
    }
    if partial.base_branch.is_some() {
        base.base_branch = partial.base_branch;
    }
    if let Some(qa) = partial.qa {
        if let Some(v) = qa.max_iterations {
            base.qa.max_iterations = v;
        }
        if let Some(v) = qa.max_consecutive_errors {
            base.qa.max_consecutive_errors = v;
        }
        if let Some(v) = qa.recurring_threshold {
            base.qa.recurring_threshold = v;
        }
        if let Some(v) = qa.min_fix_confidence {
            base.qa.min_fix_confidence = v;
        }
    }
    if let Some(pipeline) = partial.pipeline {
        if let Some(v) = pipeline.max_retries {
            base.pipeline.max_retries = v;
        }
    }
    if let Some(v) = partial.max_age_hours {
        base.max_age_hours = v;
    }
    base
}

fn merge_env_vars(mut config: EngineConfig) -> EngineConfig {
    if let Ok(v) = std::env::var("SPECFORGE_STATE_ROOT") {
        config.state_root = v;
    }
    if let Ok(v) = std::env::var("SPECFORGE_WORKTREE_NAMESPACE") {
        config.worktree_namespace = v;
    }
    if let Ok(v) = std::env::var("SPECFORGE_BASE_BRANCH") {
        config.base_branch = Some(v);
    }
    if let Ok(v) = std::env::var("SPECFORGE_QA_MAX_ITERATIONS") {
        if let Ok(v) = v.parse() {
            config.qa.max_iterations = v;
        }
    }
    if let Ok(v) = std::env::var("SPECFORGE_QA_MAX_CONSECUTIVE_ERRORS") {
        if let Ok(v) = v.parse() {
            config.qa.max_consecutive_errors = v;
        }
    }
    if let Ok(v) = std::env::var("SPECFORGE_QA_RECURRING_THRESHOLD") {
        if let Ok(v) = v.parse() {
            config.qa.recurring_threshold = v;
        }
    }
    if let Ok(v) = std::env::var("SPECFORGE_QA_MIN_FIX_CONFIDENCE") {
        if let Ok(v) = v.parse() {
            config.qa.min_fix_confidence = v;
        }
    }
    if let Ok(v) = std::env::var("SPECFORGE_PIPELINE_MAX_RETRIES") {
        if let Ok(v) = v.parse() {
            config.pipeline.max_retries = v;
        }
    }
    if let Ok(v) = std::env::var("SPECFORGE_MAX_AGE_HOURS") {
        if let Ok(v) = v.parse() {
            config.max_age_hours = v;
        }
    }
    config
}

/// Where a global (cross-project) config file would live, were one ever
/// introduced — kept as the `directories` resolution point the rest of the
/// layering is grounded on.
pub fn global_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "specforge", "specforge")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("could not determine a config directory for this platform"))
}

impl AppConfig {
    /// Loads configuration for `repo_root`: built-in defaults, overridden by
    /// `<repo_root>/.specforge/config.toml` if present, overridden in turn
    /// by `SPECFORGE_*` environment variables.
    pub async fn load(repo_root: &Path, verbose: u8) -> Result<Self> {
        let mut engine = EngineConfig::default();

        let config_path = repo_root.join(CONFIG_RELATIVE_PATH);
        if config_path.exists() {
            let raw = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            let partial: PartialEngineConfig = toml::from_str(&raw)
                .with_context(|| format!("failed to parse {}", config_path.display()))?;
            engine = merge_partial(engine, partial);
        }

        engine = merge_env_vars(engine);

        Ok(Self {
            engine,
            verbose,
            working_dir: repo_root.to_path_buf(),
        })
    }

    /// Synchronous convenience constructor for call sites (tests, simple CLI
    /// paths) that have no project directory to read from — defaults plus
    /// env overrides only.
    pub fn new(verbose: u8) -> Result<Self> {
        let working_dir =
            std::env::current_dir().context("failed to read current directory")?;
        Ok(Self {
            engine: merge_env_vars(EngineConfig::default()),
            verbose,
            working_dir,
        })
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.working_dir.join(&self.engine.state_root)
    }

    /// Log level string derived from verbosity, used to seed the
    /// `tracing-subscriber` env-filter when `RUST_LOG` isn't already set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,hyper=debug,tower=debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn defaults_when_no_project_config_present() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(dir.path(), 0).await.unwrap();
        assert_eq!(config.engine.state_root, ".state");
        assert_eq!(config.engine.qa.max_iterations, 50);
        assert_eq!(config.engine.base_branch, None);
    }

    #[tokio::test]
    async fn project_toml_overrides_defaults_without_clobbering_unset_fields() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join(".specforge")).await.unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_RELATIVE_PATH),
            r#"
            base_branch = "develop"

            [qa]
            max_iterations = 10
            "#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(dir.path(), 0).await.unwrap();
        assert_eq!(config.engine.base_branch.as_deref(), Some("develop"));
        assert_eq!(config.engine.qa.max_iterations, 10);
        // untouched by the project file, still the built-in default
        assert_eq!(config.engine.qa.recurring_threshold, 3);
        assert_eq!(config.engine.state_root, ".state");
    }

    #[tokio::test]
    async fn env_vars_win_over_project_config() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join(".specforge")).await.unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_RELATIVE_PATH),
            "base_branch = \"develop\"\n",
        )
        .await
        .unwrap();

        std::env::set_var("SPECFORGE_BASE_BRANCH", "trunk");
        let config = AppConfig::load(dir.path(), 0).await.unwrap();
        std::env::remove_var("SPECFORGE_BASE_BRANCH");

        assert_eq!(config.engine.base_branch.as_deref(), Some("trunk"));
    }

    #[test]
    fn state_dir_joins_working_dir_and_state_root() {
        let config = AppConfig {
            engine: EngineConfig::default(),
            verbose: 0,
            working_dir: PathBuf::from("/repo"),
        };
        assert_eq!(config.state_dir(), PathBuf::from("/repo/.state"));
    }
}
