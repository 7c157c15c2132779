//! Routes a parsed [`Commands`] to the engine's public API and prints the
//! result. No orchestration logic lives here — only argument plumbing and
//! formatted output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::app::AppConfig;
use crate::cli::args::Commands;
use crate::qa::{AutoFixer, NoopProgress, QaLoop, StaticReviewer};
use crate::session::{SessionOrchestrator, SessionStore};
use crate::spec::{AgentPhase, DiscoveryPhase, ImpactPhase, Pipeline, PipelineContext};
use crate::subprocess::SubprocessManager;
use crate::worktree::WorktreeManager;

fn working_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

fn slugify(task: &str) -> String {
    task.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(6)
        .collect::<Vec<_>>()
        .join("-")
}

fn build_pipeline(subprocess: &SubprocessManager, repo_root: &Path, config: &AppConfig) -> Pipeline {
    let agent = Arc::new(subprocess.agent());
    Pipeline::new()
        .with_max_retries(config.engine.pipeline.max_retries)
        .register(Box::new(DiscoveryPhase {
            project_root: repo_root.to_path_buf(),
        }))
        .register(Box::new(ImpactPhase {
            repo_root: repo_root.to_path_buf(),
            base_branch: config.engine.base_branch.clone().unwrap_or_else(|| "main".to_string()),
            git: Arc::new(subprocess.git()),
        }))
        .register(Box::new(AgentPhase::new("requirements", "requirements", agent.clone())))
        .register(Box::new(AgentPhase::new("context", "context", agent.clone())))
        .register(Box::new(AgentPhase::new("write", "write", agent.clone())))
        .register(Box::new(AgentPhase::new("validate", "validate", agent.clone())))
        .register(Box::new(AgentPhase::new("review", "review", agent.clone())))
        .register(Box::new(AgentPhase::new("escalate", "escalate", agent)))
}

pub async fn execute_command(command: Option<Commands>, _verbose: u8) -> Result<()> {
    let Some(command) = command else {
        println!("No command given. Run with --help to see available commands.");
        return Ok(());
    };

    match command {
        Commands::SessionStart {
            task,
            spec_slug,
            interactive,
            path,
        } => session_start(task, spec_slug, interactive, path).await,
        Commands::SessionStatus { session_id, path } => session_status(session_id, path).await,
        Commands::SessionList { limit, path } => session_list(limit, path).await,
        Commands::WorktreeList { path } => worktree_list(path).await,
        Commands::SpecRun {
            task,
            spec_slug,
            interactive,
            path,
        } => spec_run(task, spec_slug, interactive, path).await,
        Commands::QaRun {
            worktree,
            spec_slug,
            max_iterations,
            auto_apply,
        } => qa_run(worktree, spec_slug, max_iterations, auto_apply).await,
    }
}

async fn session_start(
    task: String,
    spec_slug: Option<String>,
    interactive: bool,
    path: Option<PathBuf>,
) -> Result<()> {
    let repo_root = working_dir(path)?;
    let spec_slug = spec_slug.unwrap_or_else(|| slugify(&task));
    let config = AppConfig::load(&repo_root, 0).await.context("failed to load configuration")?;

    let store = SessionStore::new(config.state_dir().join("sessions"));
    let orchestrator = SessionOrchestrator::new(store);
    let session = orchestrator.create_session(spec_slug.clone(), task.clone()).await?;
    println!("created session {}", session.session_id);
    orchestrator.start_session(session.session_id).await?;

    let subprocess = SubprocessManager::production();
    let worktrees = WorktreeManager::new(repo_root.clone(), subprocess.clone())
        .context("failed to initialize worktree manager")?
        .with_namespace(config.engine.worktree_namespace.clone())
        .with_state_root(&config.engine.state_root);
    let wt_state = worktrees.create_worktree(&spec_slug, None).await?;
    println!("created worktree at {}", wt_state.path.display());

    let pipeline = build_pipeline(&subprocess, &repo_root, &config);
    let artifacts_dir =
        crate::spec::pipeline::spec_artifacts_dir_under(&repo_root, &config.engine.state_root, &spec_slug);
    let ctx = PipelineContext {
        spec_slug: spec_slug.clone(),
        task_description: task,
        interactive,
        artifacts_dir: artifacts_dir.clone(),
        recommended_phases: None,
    };
    let known_services: Vec<String> = Vec::new();
    let phase_results = pipeline.run(&ctx, &known_services).await?;
    for (name, _) in &phase_results {
        orchestrator
            .update_session_phase(session.session_id, name.clone())
            .await?;
    }

    let reviewer = StaticReviewer::new().with_test_execution(subprocess.clone());
    let qa_loop = QaLoop::new(Box::new(reviewer), Box::new(AutoFixer::new(false, config.engine.qa.min_fix_confidence)))
        .with_max_iterations(config.engine.qa.max_iterations);
    let outcome = qa_loop
        .run(&spec_slug, &wt_state.path, &artifacts_dir, &NoopProgress)
        .await?;

    match outcome.phase {
        crate::qa::QaPhase::Complete => {
            orchestrator
                .complete_session(session.session_id, "qa loop passed".to_string())
                .await?;
            println!("session {} completed", session.session_id);
        }
        _ => {
            orchestrator
                .fail_session(session.session_id, "qa loop did not converge".to_string())
                .await?;
            if let Some(report) = outcome.escalation_report {
                println!("escalation report written to {}", crate::qa::escalation_report_path(&wt_state.path).display());
                println!("{report}");
            }
        }
    }

    Ok(())
}

async fn session_status(session_id: String, path: Option<PathBuf>) -> Result<()> {
    let repo_root = working_dir(path)?;
    let config = AppConfig::load(&repo_root, 0).await.context("failed to load configuration")?;
    let id = Uuid::parse_str(&session_id).context("invalid session id")?;
    let store = SessionStore::new(config.state_dir().join("sessions"));
    let orchestrator = SessionOrchestrator::new(store);
    let session = orchestrator.get_session(id).await?;

    println!("session {}", session.session_id);
    println!("  spec: {}", session.spec_id);
    println!("  status: {:?}", session.status);
    println!("  phase: {:?}", session.phase);
    if let Some(seconds) = session.get_duration_seconds() {
        println!("  duration: {seconds:.1}s");
    }
    Ok(())
}

async fn session_list(limit: usize, path: Option<PathBuf>) -> Result<()> {
    let repo_root = working_dir(path)?;
    let config = AppConfig::load(&repo_root, 0).await.context("failed to load configuration")?;
    let store = SessionStore::new(config.state_dir().join("sessions"));
    for session in store.get_recent_sessions(limit).await? {
        println!("{}  {:?}  {}", session.session_id, session.status, session.spec_id);
    }
    Ok(())
}

async fn worktree_list(path: Option<PathBuf>) -> Result<()> {
    let repo_root = working_dir(path)?;
    let config = AppConfig::load(&repo_root, 0).await.context("failed to load configuration")?;
    let subprocess = SubprocessManager::production();
    let worktrees = WorktreeManager::new(repo_root, subprocess)
        .context("failed to initialize worktree manager")?
        .with_namespace(config.engine.worktree_namespace.clone())
        .with_state_root(&config.engine.state_root);
    for state in worktrees.list_sessions().await? {
        println!(
            "{:<24} {:?}  +{}/-{}  {}",
            state.name, state.status, state.stats.insertions, state.stats.deletions, state.branch
        );
    }
    Ok(())
}

async fn spec_run(task: String, spec_slug: String, interactive: bool, path: Option<PathBuf>) -> Result<()> {
    let repo_root = working_dir(path)?;
    let config = AppConfig::load(&repo_root, 0).await.context("failed to load configuration")?;
    let subprocess = SubprocessManager::production();
    let pipeline = build_pipeline(&subprocess, &repo_root, &config);

    let ctx = PipelineContext {
        spec_slug: spec_slug.clone(),
        task_description: task,
        interactive,
        artifacts_dir: crate::spec::pipeline::spec_artifacts_dir_under(&repo_root, &config.engine.state_root, &spec_slug),
        recommended_phases: None,
    };
    let results = pipeline.run(&ctx, &[]).await?;
    for (phase, value) in results {
        println!("=== {phase} ===\n{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

async fn qa_run(worktree: PathBuf, spec_slug: String, max_iterations: Option<u32>, auto_apply: bool) -> Result<()> {
    let config = AppConfig::load(&worktree, 0).await.context("failed to load configuration")?;
    let subprocess = SubprocessManager::production();
    let reviewer = StaticReviewer::new().with_test_execution(subprocess);
    let mut qa_loop = QaLoop::new(
        Box::new(reviewer),
        Box::new(AutoFixer::new(auto_apply, config.engine.qa.min_fix_confidence)),
    )
    .with_max_iterations(max_iterations.unwrap_or(config.engine.qa.max_iterations));

    let spec_dir =
        crate::spec::pipeline::spec_artifacts_dir_under(&worktree, &config.engine.state_root, &spec_slug);
    let outcome = qa_loop.run(&spec_slug, &worktree, &spec_dir, &NoopProgress).await?;
    println!("qa loop finished: {:?}", outcome.phase);
    if let Some(report) = outcome.escalation_report {
        println!("escalation report written to {}", crate::qa::escalation_report_path(&worktree).display());
        println!("{report}");
    }
    Ok(())
}
