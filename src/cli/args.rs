//! CLI argument structures
//!
//! This module defines the command-line interface surface for the engine.
//! It is a thin collaborator over the core's public API: parsing only, no
//! engine logic of its own.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "specforge")]
#[command(about = "specforge - autonomous multi-phase software engineering orchestration", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new session for a task description, running the spec
    /// pipeline and QA loop to completion
    #[command(name = "session-start")]
    SessionStart {
        /// Natural-language description of the task to perform
        task: String,

        /// Slug identifying the spec directory (derived from the task if omitted)
        #[arg(long)]
        spec_slug: Option<String>,

        /// Prompt for clarifying requirements before running the pipeline
        #[arg(long)]
        interactive: bool,

        /// Repository root to operate in (defaults to the current directory)
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },

    /// Show the status of a session
    #[command(name = "session-status")]
    SessionStatus {
        /// Session UUID
        session_id: String,

        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },

    /// List known sessions, most recent first
    #[command(name = "session-list")]
    SessionList {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },

    /// List active worktrees and their merge/diff stats
    #[command(name = "worktree-list")]
    WorktreeList {
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },

    /// Run the spec pipeline standalone, without a session or QA loop
    #[command(name = "spec-run")]
    SpecRun {
        task: String,

        #[arg(long)]
        spec_slug: String,

        #[arg(long)]
        interactive: bool,

        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },

    /// Run the QA loop standalone against an existing worktree
    #[command(name = "qa-run")]
    QaRun {
        /// Worktree directory to review and fix
        worktree: PathBuf,

        #[arg(long)]
        spec_slug: String,

        #[arg(long)]
        max_iterations: Option<u32>,

        /// Apply high-confidence fixes automatically instead of only proposing them
        #[arg(long)]
        auto_apply: bool,
    },
}
