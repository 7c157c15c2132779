//! Unified subprocess abstraction layer for external tool integration
//!
//! This module provides a clean, testable abstraction over subprocess execution,
//! used everywhere the engine shells out: git plumbing for the worktree manager,
//! and the configured agent CLI for spec/QA work.
//!
//! # Architecture
//!
//! The subprocess system uses a trait-based architecture with dependency injection:
//! - [`ProcessRunner`] - Core trait for process execution
//! - [`SubprocessManager`] - High-level manager that orchestrates different runners
//! - Specialized runners for specific tools ([`GitRunner`], [`AgentCliRunner`])
//!
//! # Examples
//!
//! ## Production Usage
//!
//! ```rust
//! use specforge::subprocess::SubprocessManager;
//!
//! let subprocess = SubprocessManager::production();
//! let git = subprocess.git();
//! let agent = subprocess.agent();
//! ```
//!
//! ## Testing with Mocks
//!
//! ```rust
//! # use specforge::subprocess::SubprocessManager;
//! let (subprocess, mock) = SubprocessManager::mock();
//!
//! mock.expect_success("git", &["status", "--porcelain"], "");
//!
//! let git = subprocess.git();
//! // ... test logic
//! ```

pub mod agent;
pub mod builder;
pub mod error;
pub mod git;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use agent::AgentCliRunner;
pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use git::GitRunner;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::ProcessCommand;
pub use runner::{ExitStatusHelper, ProcessOutput, ProcessRunner, ProcessStream};

use std::sync::Arc;

/// Central manager for subprocess operations across the engine.
///
/// `SubprocessManager` provides a unified interface for executing external processes,
/// with specialized methods for common tools (git, the agent CLI). It supports
/// both production execution and testing with mock implementations.
///
/// # Design
///
/// The manager uses dependency injection with the [`ProcessRunner`] trait, allowing
/// different implementations for production and testing. This design enables:
/// - Consistent error handling across all subprocess operations
/// - Easy testing with mock process runners
/// - Centralized configuration and logging
///
/// # Examples
///
/// ```rust
/// use specforge::subprocess::SubprocessManager;
///
/// let subprocess = SubprocessManager::production();
/// let git = subprocess.git();
///
/// let (subprocess, mock) = SubprocessManager::mock();
/// mock.expect_success("git", &["status"], "clean");
/// ```
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
    agent_binary: String,
}

impl SubprocessManager {
    /// Create a new subprocess manager with the given process runner.
    ///
    /// This is primarily used for dependency injection in testing or when
    /// you need a custom process runner implementation.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            agent_binary: "claude".to_string(),
        }
    }

    /// Override which binary [`Self::agent`] shells out to. The engine treats
    /// the agent CLI as an opaque external collaborator — callers resolve the
    /// binary name from configuration, not a hardcoded vendor default.
    pub fn with_agent_binary(mut self, binary: impl Into<String>) -> Self {
        self.agent_binary = binary.into();
        self
    }

    /// Create a production subprocess manager.
    ///
    /// Uses the real Tokio-based process runner for actual subprocess execution.
    /// This is the standard factory method for production usage.
    pub fn production() -> Self {
        Self::new(Arc::new(runner::TokioProcessRunner))
    }

    /// Create a mock subprocess manager for testing.
    ///
    /// Returns both the manager and the mock runner, allowing tests to configure
    /// expected process calls and their responses.
    #[cfg(test)]
    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    /// Get the underlying process runner.
    ///
    /// Returns a cloned Arc to the process runner for direct usage. Most code
    /// should use the specialized runners (`git()`, `agent()`) instead.
    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Create a git-specific runner.
    ///
    /// Returns a [`git::GitRunnerImpl`] that provides high-level git operations
    /// with proper error handling and logging.
    pub fn git(&self) -> git::GitRunnerImpl {
        git::GitRunnerImpl::new(Arc::clone(&self.runner))
    }

    /// Create an agent-CLI-specific runner.
    ///
    /// Returns an [`agent::AgentCliRunnerImpl`] bound to the configured agent
    /// binary, with proper error handling and environment setup.
    pub fn agent(&self) -> agent::AgentCliRunnerImpl {
        agent::AgentCliRunnerImpl::with_binary(Arc::clone(&self.runner), self.agent_binary.clone())
    }
}
