//! Runtime initialization and setup
//!
//! This module handles application startup: logging and the on-disk layout
//! the rest of the engine assumes exists before it starts creating worktrees
//! or session records.

use crate::app::{config::AppConfig, logging::init_logging};
use anyhow::{Context, Result};
use tracing::debug;

/// Initialize the application with proper logging and on-disk state directories.
pub async fn initialize_app(config: AppConfig) -> Result<()> {
    init_logging(&config);

    ensure_state_dirs(&config).await?;

    Ok(())
}

/// Create the `.state/{worktrees,sessions,specs}` directories under the
/// working directory if they don't already exist. Idempotent — safe to call
/// on every startup.
async fn ensure_state_dirs(config: &AppConfig) -> Result<()> {
    let state_root = config.state_dir();

    for sub in ["worktrees", "sessions", "specs"] {
        let dir = state_root.join(sub);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;
    }

    debug!("state directories ready under {}", state_root.display());

    Ok(())
}
